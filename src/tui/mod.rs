/// Ratatui-based TUI for Parley.
///
/// Architecture:
///   main thread:  event loop — crossterm keyboard events + mpsc UiEvent drain
///   ask task:     tokio::spawn — runs the transport call, reports one
///                 Completed event back to the main thread
///
/// Layout:
///   ┌────────────────────────────┬───────────────────┐
///   │  conversation (scrollable) │  analysis panel   │
///   │                            │  (when open)      │
///   ├────────────────────────────┴───────────────────┤
///   │  status bar (1 line)                           │
///   ├────────────────────────────────────────────────┤
///   │  input box (3 lines, fixed)                    │
///   └────────────────────────────────────────────────┘
///
/// All session state lives in the SessionController; the TUI only adds
/// presentation concerns on top (input buffer, scroll, which turn gestures
/// aim at, the settings overlay).
pub mod render;

use std::io;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ApiClient, AskError, AskResponse, AskTransport};
use crate::config::ResolvedConfig;
use crate::focus::{ActivePanel, PanelTab};
use crate::overrides::{ConversationStyle, SearchIndex};
use crate::session::{Generation, Lifecycle, SessionController};
use crate::sessions::{self, Session, StoredTurn};
use crate::telemetry::{self, SessionStats};

// ── UiEvent — typed events from the ask task → TUI ───────────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// The transport call finished. The generation ties it back to the submit
    /// that issued it; the controller discards it if it has been superseded.
    Completed {
        generation: Generation,
        duration_ms: u64,
        result: Result<AskResponse, AskError>,
    },
}

// ── Mode — TUI modal state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// "Configure answer generation" overlay
    Settings,
}

// ── Settings overlay state ────────────────────────────────────────────────────

/// Fields of the settings overlay, in display order.
pub const SETTINGS_FIELDS: &[&str] = &[
    "Override prompt template",
    "Retrieve this many documents",
    "Exclude category",
    "Stock filter",
    "Use semantic ranker",
    "Use query-contextual summaries",
    "Suggest follow-up questions",
    "Conversation style",
    "Search index",
];

pub struct SettingsState {
    /// Which field is highlighted
    pub selected: usize,
    /// True while typing into a text field
    pub editing: bool,
    /// Buffer for the field being edited
    pub edit_buffer: String,
}

impl SettingsState {
    fn new() -> Self {
        Self {
            selected: 0,
            editing: false,
            edit_buffer: String::new(),
        }
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub controller: SessionController,
    pub input: String,
    pub cursor: usize, // byte offset in input
    pub mode: Mode,
    pub scroll: usize, // lines scrolled up in the conversation
    pub profile: String,
    pub endpoint: String,
    /// Highlighted row in the empty-state example list
    pub example_selected: usize,
    /// Turn that panel gestures aim at (≠ the controller's selected turn,
    /// which only moves through the toggle operations)
    pub cursor_turn: usize,
    /// Cycles through the last turn's follow-up questions on Tab
    pub followup_cycle: usize,
    pub settings: SettingsState,
    /// Incremented every 120ms while a request is in flight
    pub spinner_tick: u32,
    /// Outstanding ask task; aborted when a newer submit supersedes it
    inflight: Option<(Generation, JoinHandle<()>)>,
    submit_started: Option<Instant>,
    current_is_retry: bool,
    pub transport: Arc<ApiClient>,

    // ── Persistence + telemetry ───────────────────────────────────────────────
    pub session: Option<Session>,
    /// Prior-session turns replayed for display only
    pub resumed: Vec<StoredTurn>,
    pub stats: SessionStats,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig, transport: Arc<ApiClient>) -> Self {
        let mut controller = SessionController::new();
        controller.overrides.index = SearchIndex::parse(&resolved.index);
        Self {
            controller,
            input: String::new(),
            cursor: 0,
            mode: Mode::Normal,
            scroll: 0,
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            example_selected: 0,
            cursor_turn: 0,
            followup_cycle: 0,
            settings: SettingsState::new(),
            spinner_tick: 0,
            inflight: None,
            submit_started: None,
            current_is_retry: false,
            transport,
            session: None,
            resumed: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    /// True while the conversation shows nothing at all (drives the
    /// empty-state example list).
    pub fn shows_empty_state(&self) -> bool {
        self.controller.last_question().is_empty() && self.resumed.is_empty()
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Completed {
                generation,
                duration_ms,
                result,
            } => {
                let applied = self.controller.complete(generation, result);
                if !applied {
                    // Superseded or post-clear completion — nothing to show.
                    return;
                }

                if let Some((g, _)) = &self.inflight {
                    if *g == generation {
                        self.inflight = None;
                    }
                }

                let ok = self.controller.error().is_none();
                let citations = self
                    .controller
                    .turns()
                    .last()
                    .map(|t| t.response.citations().len())
                    .unwrap_or(0);

                if ok {
                    // Aim gestures at the fresh turn and persist it.
                    self.cursor_turn = self.controller.turns().len().saturating_sub(1);
                    self.followup_cycle = 0;
                    self.scroll = 0;
                    if let (Some(session), Some(turn)) =
                        (&mut self.session, self.controller.turns().last())
                    {
                        let stored = StoredTurn {
                            turn_index: session.turn_count,
                            timestamp: chrono::Utc::now().timestamp(),
                            question: turn.question.clone(),
                            response: turn.response.clone(),
                        };
                        if sessions::append_turn(&session.path, &stored).is_ok() {
                            session.turn_count += 1;
                        }
                    }
                }

                let duration = self
                    .submit_started
                    .take()
                    .map(|s| s.elapsed().as_millis() as u64)
                    .unwrap_or(duration_ms);
                let record = self.stats.record_question(
                    self.session.as_ref().map(|s| s.id.as_str()).unwrap_or(""),
                    self.controller.last_question(),
                    ok,
                    self.current_is_retry,
                    if ok { citations } else { 0 },
                    duration,
                    &self.profile,
                    self.controller.overrides.index.wire_value(),
                );
                let _ = telemetry::append_record(&record);
                self.current_is_retry = false;
            }
        }
    }
}

// ── Launching ask tasks ───────────────────────────────────────────────────────

/// Begin a submission and run the transport call on its own task. A still
/// outstanding task is aborted — its result would be discarded by the
/// generation check anyway, aborting just stops the wasted work.
fn launch_ask(
    question: &str,
    state: &mut AppState,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
    retry: bool,
) {
    let pending = if retry {
        state.controller.begin_retry()
    } else {
        state.controller.begin_submit(question)
    };
    let Some(pending) = pending else { return };

    if let Some((_, handle)) = state.inflight.take() {
        handle.abort();
    }

    state.submit_started = Some(Instant::now());
    state.current_is_retry = retry;
    state.scroll = 0;

    let transport = state.transport.clone();
    let tx = ui_tx.clone();
    let generation = pending.generation;
    let request = pending.request;
    let handle = tokio::spawn(async move {
        let started = Instant::now();
        let result = transport.ask(&request).await;
        let _ = tx.send(UiEvent::Completed {
            generation,
            duration_ms: started.elapsed().as_millis() as u64,
            result,
        });
    });
    state.inflight = Some((generation, handle));
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, resolved).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    resolved: ResolvedConfig,
) -> Result<()> {
    let mut api = ApiClient::new(resolved.endpoint.clone());
    if let Some(key) = &resolved.api_key {
        api.set_api_key(key.clone());
    }
    if let Some(secs) = resolved.timeout_secs {
        api.set_timeout(secs);
    }

    let mut state = AppState::new(&resolved, Arc::new(api));

    // Replay the most recent session for this cwd (display only — the live
    // conversation starts fresh).
    let cwd = cwd_str();
    if let Some((_id, path)) = sessions::find_latest_for_cwd(&cwd) {
        if let Ok(turns) = sessions::load_session_turns(&path) {
            state.resumed = turns;
        }
    }

    // Open a new session file for this invocation (non-fatal if storage is
    // unavailable — the conversation just won't persist).
    if let Ok(session) = sessions::open_session(&cwd) {
        state.session = Some(session);
        sessions::prune_old_sessions(10);
    }

    // Channel: ask task → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Spinner tick ──────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.controller.is_busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Completions from ask tasks ────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        let keep = handle_key(key, &mut state, &ui_tx);
                        if !keep { break; }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    // Abort any still-outstanding ask task before teardown.
    if let Some((_, handle)) = state.inflight.take() {
        handle.abort();
    }

    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

fn handle_key(key: KeyEvent, state: &mut AppState, ui_tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    // ── Settings overlay ──────────────────────────────────────────────────────
    if state.mode == Mode::Settings {
        handle_settings_key(key, state);
        return true;
    }

    match (key.modifiers, key.code) {
        // Ctrl+C / Ctrl+D — quit
        (KeyModifiers::CONTROL, KeyCode::Char('c'))
        | (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
            return false;
        }
        // Ctrl+O — settings overlay
        (KeyModifiers::CONTROL, KeyCode::Char('o')) => {
            state.settings = SettingsState::new();
            state.mode = Mode::Settings;
        }
        // Ctrl+R — retry the failed question
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => {
            if state.controller.state() == Lifecycle::Failed {
                launch_ask("", state, ui_tx, true);
            }
        }
        // Ctrl+L — clear the conversation (disabled while busy / empty)
        (KeyModifiers::CONTROL, KeyCode::Char('l')) => {
            if state.controller.can_clear() {
                state.controller.clear();
                state.cursor_turn = 0;
                state.followup_cycle = 0;
                state.scroll = 0;
                state.resumed.clear();
            } else if !state.controller.is_busy() && !state.resumed.is_empty() {
                // Nothing live yet — just dismiss the replayed turns.
                state.resumed.clear();
                state.scroll = 0;
            }
        }
        // Ctrl+T — thought-process panel for the cursor turn
        (KeyModifiers::CONTROL, KeyCode::Char('t')) => {
            if !state.controller.turns().is_empty() {
                state
                    .controller
                    .toggle_tab(PanelTab::ThoughtProcess, state.cursor_turn);
            }
        }
        // Ctrl+S — supporting-content panel for the cursor turn
        (KeyModifiers::CONTROL, KeyCode::Char('s')) => {
            if !state.controller.turns().is_empty() {
                state
                    .controller
                    .toggle_tab(PanelTab::SupportingContent, state.cursor_turn);
            }
        }
        // Esc — collapse the open panel (a second toggle of the same panel)
        (KeyModifiers::NONE, KeyCode::Esc) => {
            let selected = state.controller.focus().selected_turn;
            match state.controller.focus().panel.clone() {
                ActivePanel::Citation(c) => state.controller.show_citation(&c, selected),
                ActivePanel::ThoughtProcess => {
                    state.controller.toggle_tab(PanelTab::ThoughtProcess, selected);
                }
                ActivePanel::SupportingContent => {
                    state
                        .controller
                        .toggle_tab(PanelTab::SupportingContent, selected);
                }
                ActivePanel::None => {}
            }
        }
        // Tab — cycle the latest turn's follow-up questions into the input
        (KeyModifiers::NONE, KeyCode::Tab) => {
            if state.controller.overrides.suggest_followups {
                if let Some(turn) = state.controller.turns().last() {
                    let followups = turn.response.followup_questions();
                    if !followups.is_empty() {
                        let pick = &followups[state.followup_cycle % followups.len()];
                        state.followup_cycle += 1;
                        state.input = pick.clone();
                        state.cursor = state.input.len();
                    }
                }
            }
        }
        // 1-9 — open the Nth citation of the cursor turn (only with empty input)
        (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='9')) if state.input.is_empty() => {
            if let Some(turn) = state.controller.turn(state.cursor_turn) {
                let n = c as usize - '1' as usize;
                let citations = turn.response.citations();
                if let Some(citation) = citations.get(n) {
                    state.controller.show_citation(citation, state.cursor_turn);
                }
            }
        }
        // Enter — submit input, or the selected example on the empty state
        (KeyModifiers::NONE, KeyCode::Enter) => {
            let input = state.input.trim().to_string();
            if !input.is_empty() {
                state.input.clear();
                state.cursor = 0;
                launch_ask(&input, state, ui_tx, false);
            } else if state.shows_empty_state() {
                if let Some(example) = crate::prompts::EXAMPLES.get(state.example_selected) {
                    launch_ask(example.value, state, ui_tx, false);
                }
            }
        }
        // Left/Right — input cursor when typing, turn selection when not
        (KeyModifiers::NONE, KeyCode::Left) => {
            if state.input.is_empty() {
                state.cursor_turn = state.cursor_turn.saturating_sub(1);
            } else {
                state.cursor = prev_char_boundary(&state.input, state.cursor);
            }
        }
        (KeyModifiers::NONE, KeyCode::Right) => {
            if state.input.is_empty() {
                let max = state.controller.turns().len().saturating_sub(1);
                state.cursor_turn = (state.cursor_turn + 1).min(max);
            } else {
                state.cursor = next_char_boundary(&state.input, state.cursor);
            }
        }
        // Up/Down — example selection on the empty state, scroll otherwise
        (KeyModifiers::NONE, KeyCode::Up) | (KeyModifiers::NONE, KeyCode::PageUp) => {
            if state.shows_empty_state() && state.input.is_empty() {
                state.example_selected = state.example_selected.saturating_sub(1);
            } else {
                state.scroll = state.scroll.saturating_add(3);
            }
        }
        (KeyModifiers::NONE, KeyCode::Down) | (KeyModifiers::NONE, KeyCode::PageDown) => {
            if state.shows_empty_state() && state.input.is_empty() {
                state.example_selected =
                    (state.example_selected + 1).min(crate::prompts::EXAMPLES.len() - 1);
            } else {
                state.scroll = state.scroll.saturating_sub(3);
            }
        }
        // Home / End — input cursor
        (KeyModifiers::NONE, KeyCode::Home) => {
            state.cursor = 0;
        }
        (KeyModifiers::NONE, KeyCode::End) => {
            state.cursor = state.input.len();
        }
        // Backspace / Delete — edit input
        (KeyModifiers::NONE, KeyCode::Backspace) => {
            input_backspace(&mut state.input, &mut state.cursor);
        }
        (KeyModifiers::NONE, KeyCode::Delete) => {
            input_delete_forward(&mut state.input, &mut state.cursor);
        }
        // Ctrl+U — clear line before cursor
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            state.input.drain(..state.cursor);
            state.cursor = 0;
        }
        // Regular char input — insert at cursor
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
            let mut buf = [0u8; 4];
            let s = c.encode_utf8(&mut buf);
            state.input.insert_str(state.cursor, s);
            state.cursor += s.len();
        }
        _ => {}
    }

    true
}

// ── Settings overlay keys ─────────────────────────────────────────────────────

fn handle_settings_key(key: KeyEvent, state: &mut AppState) {
    let s = &mut state.settings;
    let overrides = &mut state.controller.overrides;

    if s.editing {
        match key.code {
            KeyCode::Esc => {
                s.editing = false;
                s.edit_buffer.clear();
            }
            KeyCode::Enter => {
                match s.selected {
                    0 => overrides.set_prompt_template(&s.edit_buffer),
                    1 => overrides.set_retrieval_count(&s.edit_buffer),
                    2 => overrides.set_exclude_category(&s.edit_buffer),
                    3 => overrides.set_stock_filter(&s.edit_buffer),
                    _ => {}
                }
                s.editing = false;
                s.edit_buffer.clear();
            }
            KeyCode::Backspace => {
                s.edit_buffer.pop();
            }
            KeyCode::Char(c) => {
                s.edit_buffer.push(c);
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            state.mode = Mode::Normal;
        }
        KeyCode::Up => {
            s.selected = s.selected.saturating_sub(1);
        }
        KeyCode::Down => {
            s.selected = (s.selected + 1).min(SETTINGS_FIELDS.len() - 1);
        }
        KeyCode::Enter | KeyCode::Char(' ') => match s.selected {
            // Text fields open the edit buffer pre-filled with the current value
            0 => {
                s.edit_buffer = overrides.prompt_template().to_string();
                s.editing = true;
            }
            1 => {
                s.edit_buffer = overrides.retrieval_count().to_string();
                s.editing = true;
            }
            2 => {
                s.edit_buffer = overrides.exclude_category().to_string();
                s.editing = true;
            }
            3 => {
                s.edit_buffer = overrides.stock_filter().to_string();
                s.editing = true;
            }
            // Checkboxes
            4 => overrides.use_semantic_ranker = !overrides.use_semantic_ranker,
            5 => {
                // Only actionable while the semantic ranker is on
                if overrides.captions_enabled() {
                    overrides.use_semantic_captions = !overrides.use_semantic_captions;
                }
            }
            6 => overrides.suggest_followups = !overrides.suggest_followups,
            // Radio groups cycle
            7 => overrides.conversation_style = next_style(overrides.conversation_style),
            8 => overrides.index = next_index(overrides.index),
            _ => {}
        },
        _ => {}
    }
}

fn next_style(style: ConversationStyle) -> ConversationStyle {
    let all = ConversationStyle::ALL;
    let pos = all.iter().position(|s| *s == style).unwrap_or(0);
    all[(pos + 1) % all.len()]
}

fn next_index(index: SearchIndex) -> SearchIndex {
    let all = SearchIndex::ALL;
    let pos = all.iter().position(|i| *i == index).unwrap_or(0);
    all[(pos + 1) % all.len()]
}

// ── Input editing helpers ─────────────────────────────────────────────────────

pub fn cwd_str() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string())
}

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while p > 0 && !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p < s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p
}

fn input_backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let start = prev_char_boundary(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
}

fn input_delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let end = next_char_boundary(input, *cursor);
    input.drain(*cursor..end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_editing_respects_char_boundaries() {
        let mut input = "héllo".to_string();
        let mut cursor = input.len();
        input_backspace(&mut input, &mut cursor);
        assert_eq!(input, "héll");
        cursor = 1;
        input_delete_forward(&mut input, &mut cursor);
        assert_eq!(input, "hll");
    }

    #[test]
    fn style_and_index_cycles_wrap() {
        let mut style = ConversationStyle::Balance;
        for _ in 0..ConversationStyle::ALL.len() {
            style = next_style(style);
        }
        assert_eq!(style, ConversationStyle::Balance);

        let mut index = SearchIndex::Default;
        for _ in 0..SearchIndex::ALL.len() {
            index = next_index(index);
        }
        assert_eq!(index, SearchIndex::Default);
    }
}

/// Ratatui draw entry-point for Parley.
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use super::{AppState, Mode, SETTINGS_FIELDS};
use crate::focus::ActivePanel;
use crate::history::Turn;
use crate::prompts;
use crate::session::ErrorKind;

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const DIM: Color = Color::Rgb(110, 105, 140);
const ACCENT: Color = Color::Cyan;

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // conversation (+ analysis panel)
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input box
        ])
        .split(area);

    // Side panel opens next to the conversation when a turn is under
    // inspection.
    let panel_open = state.controller.focus().is_open() && !state.controller.turns().is_empty();
    if panel_open {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[0]);
        draw_conversation(f, state, cols[0]);
        draw_analysis_panel(f, state, cols[1]);
    } else {
        draw_conversation(f, state, chunks[0]);
    }

    draw_status_bar(f, state, chunks[1]);
    draw_input(f, state, chunks[2]);

    if state.mode == Mode::Settings {
        draw_settings_overlay(f, state, area);
    }
}

// ── Conversation ──────────────────────────────────────────────────────────────

fn draw_conversation(f: &mut Frame, state: &AppState, area: Rect) {
    if state.shows_empty_state() {
        draw_empty_state(f, state, area);
        return;
    }

    let width = area.width.saturating_sub(2).max(20) as usize;
    let mut lines: Vec<Line> = Vec::new();

    // Prior-session turns, dimmed. Display only — panels and citation keys
    // work on the live conversation below.
    if !state.resumed.is_empty() {
        for turn in &state.resumed {
            push_wrapped(&mut lines, &format!("❯ {}", turn.question), Style::default().fg(DIM), width);
            push_wrapped(&mut lines, &turn.response.answer_text(), Style::default().fg(DIM), width);
            lines.push(Line::raw(""));
        }
        lines.push(Line::from(Span::styled(
            format!("↩ resumed {} earlier turn(s) · Ctrl+L to start fresh", state.resumed.len()),
            Style::default().fg(DIM).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::raw(""));
    }

    for (index, turn) in state.controller.turns().iter().enumerate() {
        draw_turn(&mut lines, state, turn, index, width);
    }

    // In-flight question
    if state.controller.is_busy() {
        push_wrapped(
            &mut lines,
            &format!("❯ {}", state.controller.last_question()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            width,
        );
        let glyph = SPINNER_GLYPHS[state.spinner_tick as usize % SPINNER_GLYPHS.len()];
        lines.push(Line::from(Span::styled(
            format!("  {glyph} asking…"),
            Style::default().fg(ACCENT),
        )));
    }

    // Failed question + retry affordance
    if let Some(err) = state.controller.error() {
        push_wrapped(
            &mut lines,
            &format!("❯ {}", state.controller.last_question()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            width,
        );
        let kind = match err.kind {
            ErrorKind::Transport => "network",
            ErrorKind::Service => "service",
            ErrorKind::Malformed => "response",
        };
        push_wrapped(
            &mut lines,
            &format!("  ✗ {kind} failure: {}", err.detail),
            Style::default().fg(Color::Red),
            width,
        );
        lines.push(Line::from(Span::styled(
            "  Ctrl+R to retry",
            Style::default().fg(DIM),
        )));
    }

    // Anchor to the bottom, offset by the scroll position.
    let height = area.height as usize;
    let total = lines.len();
    let bottom = total.saturating_sub(state.scroll);
    let start = bottom.saturating_sub(height);
    let visible: Vec<Line> = lines[start..bottom].to_vec();

    f.render_widget(Paragraph::new(visible), area);
}

fn draw_turn(lines: &mut Vec<Line>, state: &AppState, turn: &Turn, index: usize, width: usize) {
    let focus = state.controller.focus();
    let selected = focus.selected_turn == index && focus.is_open();
    let at_cursor = state.cursor_turn == index;

    let marker = if at_cursor { "▌" } else { " " };
    let question_style = if selected {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    push_wrapped(
        lines,
        &format!("{marker}❯ {}", turn.question),
        question_style,
        width,
    );

    push_wrapped(lines, &turn.response.answer_text(), Style::default(), width);

    // Citation chips: `1 plans.pdf · 2 pricing.pdf`
    let citations = turn.response.citations();
    if !citations.is_empty() {
        let chips: Vec<String> = citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} {c}", i + 1))
            .collect();
        push_wrapped(
            lines,
            &format!("  sources: {}", chips.join(" · ")),
            Style::default().fg(ACCENT),
            width,
        );
    }

    // Follow-up suggestions show on the latest turn only.
    let is_last = index + 1 == state.controller.turns().len();
    if is_last && state.controller.overrides.suggest_followups {
        let followups = turn.response.followup_questions();
        if !followups.is_empty() {
            push_wrapped(
                lines,
                &format!("  follow up (Tab): {}", followups.join("  ·  ")),
                Style::default().fg(Color::Yellow),
                width,
            );
        }
    }

    lines.push(Line::raw(""));
}

// ── Empty state ───────────────────────────────────────────────────────────────

fn draw_empty_state(f: &mut Frame, state: &AppState, area: Rect) {
    let mut lines: Vec<Line> = vec![
        Line::raw(""),
        Line::from(Span::styled(
            "PARLEY",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Ask anything about your documents, or try an example",
            Style::default().fg(DIM),
        )),
        Line::raw(""),
    ];

    for (i, example) in prompts::EXAMPLES.iter().enumerate() {
        let style = if i == state.example_selected {
            Style::default().fg(Color::Black).bg(ACCENT)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!(" {} ", example.text), style),
        ]));
        lines.push(Line::raw(""));
    }

    lines.push(Line::from(Span::styled(
        "↑↓ choose · Enter ask · Ctrl+O settings",
        Style::default().fg(DIM),
    )));

    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        centered_vertically(area, 12),
    );
}

// ── Analysis panel ────────────────────────────────────────────────────────────

fn draw_analysis_panel(f: &mut Frame, state: &AppState, area: Rect) {
    let focus = state.controller.focus();
    let Some(turn) = state.controller.turn(focus.selected_turn) else {
        return;
    };

    let width = area.width.saturating_sub(4).max(20) as usize;
    let (title, mut lines) = match &focus.panel {
        ActivePanel::Citation(citation) => {
            let mut lines: Vec<Line> = Vec::new();
            // Supporting passages are "source: excerpt" entries; show the ones
            // from the cited source, or fall back to naming the source.
            let matching: Vec<&String> = turn
                .response
                .data_points
                .iter()
                .filter(|d| d.starts_with(citation.as_str()))
                .collect();
            if matching.is_empty() {
                push_wrapped(
                    &mut lines,
                    &format!("No excerpt available for {citation}."),
                    Style::default().fg(DIM),
                    width,
                );
            } else {
                for d in matching {
                    push_wrapped(&mut lines, d, Style::default(), width);
                    lines.push(Line::raw(""));
                }
            }
            (format!(" Citation · {citation} "), lines)
        }
        ActivePanel::ThoughtProcess => {
            let mut lines: Vec<Line> = Vec::new();
            match turn.response.thoughts.as_deref() {
                Some(thoughts) if !thoughts.trim().is_empty() => {
                    push_wrapped(&mut lines, thoughts, Style::default(), width);
                }
                _ => {
                    lines.push(Line::from(Span::styled(
                        "No thought process recorded for this answer.",
                        Style::default().fg(DIM),
                    )));
                }
            }
            (" Thought process ".to_string(), lines)
        }
        ActivePanel::SupportingContent => {
            let mut lines: Vec<Line> = Vec::new();
            if turn.response.data_points.is_empty() {
                lines.push(Line::from(Span::styled(
                    "No supporting content returned.",
                    Style::default().fg(DIM),
                )));
            } else {
                for d in &turn.response.data_points {
                    push_wrapped(&mut lines, d, Style::default(), width);
                    lines.push(Line::raw(""));
                }
            }
            (" Supporting content ".to_string(), lines)
        }
        ActivePanel::None => return,
    };

    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
        "Esc close · Ctrl+T thoughts · Ctrl+S content",
        Style::default().fg(DIM),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title(Span::styled(
            format!("{title}· turn {} ", focus.selected_turn + 1),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", state.profile),
            Style::default().fg(Color::Black).bg(ACCENT),
        ),
        Span::styled(
            format!(" {} · {}", state.endpoint, state.controller.overrides.index.wire_value()),
            Style::default().fg(DIM),
        ),
    ];

    if state.controller.is_busy() {
        let glyph = SPINNER_GLYPHS[state.spinner_tick as usize % SPINNER_GLYPHS.len()];
        spans.push(Span::styled(
            format!("  {glyph} asking"),
            Style::default().fg(ACCENT),
        ));
    } else if state.controller.error().is_some() {
        spans.push(Span::styled("  ✗ failed — Ctrl+R retries", Style::default().fg(Color::Red)));
    }

    if state.stats.questions_asked > 0 {
        spans.push(Span::styled(
            format!(
                "  ·  {} asked, {} failed",
                state.stats.questions_asked, state.stats.failures
            ),
            Style::default().fg(DIM),
        ));
    }

    spans.push(Span::styled(
        "  ·  1-9 citation · Ctrl+T/S panels · Ctrl+O settings · Ctrl+L clear",
        Style::default().fg(DIM),
    ));

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(6, 6, 12))),
        area,
    );
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let border_style = if state.controller.is_busy() {
        Style::default().fg(DIM)
    } else {
        Style::default().fg(ACCENT)
    };

    let content = if state.input.is_empty() {
        Line::from(Span::styled(
            "Type to ask a question",
            Style::default().fg(DIM),
        ))
    } else {
        Line::from(Span::raw(state.input.clone()))
    };

    let block = Block::default().borders(Borders::ALL).border_style(border_style);
    f.render_widget(Paragraph::new(content).block(block), area);

    // Place the terminal cursor at the edit position.
    let before = &state.input[..state.cursor.min(state.input.len())];
    let x = area.x + 1 + before.width() as u16;
    let y = area.y + 1;
    if x < area.x + area.width - 1 {
        f.set_cursor_position((x, y));
    }
}

// ── Settings overlay ──────────────────────────────────────────────────────────

fn draw_settings_overlay(f: &mut Frame, state: &AppState, area: Rect) {
    let overlay = centered_rect(area, 60, 17);
    f.render_widget(Clear, overlay);

    let o = &state.controller.overrides;
    let values: Vec<String> = vec![
        preview_or_unset(o.prompt_template()),
        o.retrieval_count().to_string(),
        preview_or_unset(o.exclude_category()),
        preview_or_unset(o.stock_filter()),
        checkbox(o.use_semantic_ranker),
        if o.captions_enabled() {
            checkbox(o.use_semantic_captions)
        } else {
            "— requires semantic ranker".to_string()
        },
        checkbox(o.suggest_followups),
        o.conversation_style.label().to_string(),
        o.index.wire_value().to_string(),
    ];

    let mut lines: Vec<Line> = vec![Line::raw("")];
    for (i, (label, value)) in SETTINGS_FIELDS.iter().zip(values.iter()).enumerate() {
        let selected = state.settings.selected == i;
        let label_style = if selected {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let shown_value = if selected && state.settings.editing {
            format!("{}▏", state.settings.edit_buffer)
        } else {
            value.clone()
        };
        lines.push(Line::from(vec![
            Span::raw(if selected { " ❯ " } else { "   " }),
            Span::styled(format!("{label:<32}"), label_style),
            Span::styled(shown_value, Style::default().fg(DIM)),
        ]));
    }
    lines.push(Line::raw(""));
    let stats = &state.stats;
    if stats.questions_asked > 0 {
        lines.push(Line::from(Span::styled(
            format!(
                "   session: {} asked · {} answered · {} failed · {} retried",
                stats.questions_asked, stats.answers_received, stats.failures, stats.retries
            ),
            Style::default().fg(DIM),
        )));
    }
    let hint = if state.settings.editing {
        "Enter save · Esc cancel"
    } else {
        "↑↓ field · Enter/Space change · Esc close"
    };
    lines.push(Line::from(Span::styled(
        format!("   {hint}"),
        Style::default().fg(DIM),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title(Span::styled(
            " Configure answer generation ",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(Paragraph::new(lines).block(block), overlay);
}

fn preview_or_unset(s: &str) -> String {
    if s.is_empty() {
        "(unset)".to_string()
    } else if s.chars().count() > 24 {
        let head: String = s.chars().take(21).collect();
        format!("{head}…")
    } else {
        s.to_string()
    }
}

fn checkbox(v: bool) -> String {
    if v { "[x]" } else { "[ ]" }.to_string()
}

// ── Layout helpers ────────────────────────────────────────────────────────────

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn centered_vertically(area: Rect, content_height: u16) -> Rect {
    let h = content_height.min(area.height);
    Rect {
        x: area.x,
        y: area.y + (area.height - h) / 2,
        width: area.width,
        height: h,
    }
}

// ── Text wrapping ─────────────────────────────────────────────────────────────

/// Word-wrap `text` to `width` display columns and push one styled Line per
/// wrapped row. Continuation rows keep a two-space hang.
fn push_wrapped(lines: &mut Vec<Line>, text: &str, style: Style, width: usize) {
    for (i, row) in wrap_text(text, width).into_iter().enumerate() {
        let row = if i == 0 { row } else { format!("  {row}") };
        lines.push(Line::from(Span::styled(row, style)));
    }
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for raw_line in text.lines() {
        if raw_line.width() <= width {
            out.push(raw_line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let needed = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if needed > width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_splits_on_word_boundaries() {
        let rows = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert!(rows.len() > 1);
        for row in &rows {
            assert!(row.width() <= 15, "row too wide: {row:?}");
        }
        assert_eq!(rows.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_keeps_short_lines_intact() {
        assert_eq!(wrap_text("short", 40), vec!["short".to_string()]);
        assert_eq!(wrap_text("", 40), vec![String::new()]);
    }
}

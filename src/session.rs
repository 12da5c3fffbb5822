/// Conversation session controller.
///
/// Owns everything one conversation is: the answer-generation overrides, the
/// completed turn history, the focus state, the last error, and the request
/// lifecycle. The presentation layer calls straight into these methods; the
/// only asynchronous boundary is the injected [`AskTransport`].
///
/// The lifecycle is split into `begin_submit` / `complete` so the TUI can run
/// the transport call on a spawned task: `begin_submit` hands back a
/// generation token with the built request, and `complete` applies a result
/// only if its token is still the latest one issued. A second submit (or a
/// clear) while one is outstanding simply bumps the generation — the older
/// call's result arrives stale and is discarded, so the newest action always
/// wins without any shared mutable state.
use crate::client::{AskError, AskRequest, AskResponse, AskTransport};
use crate::focus::{FocusState, PanelTab};
use crate::history::{History, Turn};
use crate::overrides::AnswerOverrides;

// ── Lifecycle state ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Submitting,
    Failed,
}

// ── Session error ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Service,
    Malformed,
}

/// The last submission failure, kept until the next submission or clear.
/// `detail` preserves the underlying cause text for display.
#[derive(Debug, Clone)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl From<AskError> for SessionError {
    fn from(e: AskError) -> Self {
        let kind = match &e {
            AskError::Transport(_) => ErrorKind::Transport,
            AskError::Service { .. } => ErrorKind::Service,
            AskError::Malformed(_) => ErrorKind::Malformed,
        };
        Self {
            kind,
            detail: e.to_string(),
        }
    }
}

// ── Submission token ──────────────────────────────────────────────────────────

/// Opaque token tying a transport result back to the submit that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// What `begin_submit` hands to the caller: the token plus the fully-built
/// request payload to put on the wire.
#[derive(Debug)]
pub struct PendingSubmit {
    pub generation: Generation,
    pub request: AskRequest,
}

// ── Controller ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SessionController {
    pub overrides: AnswerOverrides,
    history: History,
    focus: FocusState,
    state: Lifecycle,
    error: Option<SessionError>,
    /// Most recently submitted question, kept across failures so retry can
    /// resubmit it verbatim. Also gates the empty-state / clear affordances.
    last_question: String,
    generation: u64,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read surface for the presentation layer ───────────────────────────────

    pub fn turns(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn turn(&self, index: usize) -> Option<&Turn> {
        self.history.get(index)
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == Lifecycle::Submitting
    }

    pub fn last_question(&self) -> &str {
        &self.last_question
    }

    /// True when there is anything to clear and no request is in flight.
    pub fn can_clear(&self) -> bool {
        !self.last_question.is_empty() && !self.is_busy()
    }

    // ── Request lifecycle ─────────────────────────────────────────────────────

    /// Start a submission. Returns `None` for an empty question — no state is
    /// touched in that case. Otherwise clears the previous error, closes any
    /// open panel, records the question for retry, and returns the request to
    /// send. Calling this while a submission is outstanding supersedes it.
    pub fn begin_submit(&mut self, question: &str) -> Option<PendingSubmit> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        self.generation += 1;
        self.error = None;
        self.focus.close_panel();
        self.last_question = question.to_string();
        self.state = Lifecycle::Submitting;

        Some(PendingSubmit {
            generation: Generation(self.generation),
            request: AskRequest::build(self.history.turns(), question, &self.overrides),
        })
    }

    /// Resubmit the last question. Always permitted from `Failed`; a no-op
    /// when nothing has been asked yet.
    pub fn begin_retry(&mut self) -> Option<PendingSubmit> {
        if self.last_question.is_empty() {
            return None;
        }
        let question = self.last_question.clone();
        self.begin_submit(&question)
    }

    /// Apply a transport result. Only the result matching the latest issued
    /// token lands; anything else (superseded submit, completion after clear,
    /// duplicate delivery) is discarded without observable effect. Returns
    /// whether the result was applied.
    pub fn complete(
        &mut self,
        generation: Generation,
        result: Result<AskResponse, AskError>,
    ) -> bool {
        if self.state != Lifecycle::Submitting || generation.0 != self.generation {
            return false;
        }
        match result {
            Ok(response) => {
                self.history.append(self.last_question.clone(), response);
                self.state = Lifecycle::Idle;
            }
            Err(e) => {
                self.error = Some(SessionError::from(e));
                self.state = Lifecycle::Failed;
            }
        }
        true
    }

    /// Reset the whole session: history, error, focus, last question. Valid
    /// from any state and forces `Idle`. Bumps the generation so an in-flight
    /// completion arriving afterwards is stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.history.clear();
        self.error = None;
        self.focus = FocusState::default();
        self.last_question.clear();
        self.state = Lifecycle::Idle;
    }

    /// Inline submit for the single-shot CLI path, where nothing can overlap.
    /// Returns false if the question was rejected as empty; otherwise the
    /// outcome is in `turns()` / `error()`.
    pub async fn submit(&mut self, transport: &dyn AskTransport, question: &str) -> bool {
        let Some(pending) = self.begin_submit(question) else {
            return false;
        };
        let result = transport.ask(&pending.request).await;
        self.complete(pending.generation, result);
        true
    }

    // ── Focus operations ──────────────────────────────────────────────────────

    pub fn show_citation(&mut self, citation: &str, turn: usize) {
        self.focus.show_citation(citation, turn);
    }

    pub fn toggle_tab(&mut self, tab: PanelTab, turn: usize) {
        self.focus.toggle_tab(tab, turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::ActivePanel;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn response(answer: &str) -> AskResponse {
        AskResponse {
            answer: answer.to_string(),
            thoughts: None,
            data_points: Vec::new(),
            error: None,
        }
    }

    fn service_error(detail: &str) -> AskError {
        AskError::Service {
            status: 502,
            detail: detail.to_string(),
        }
    }

    /// Transport that pops scripted results in order and records the question
    /// of every request it sees.
    struct ScriptedTransport {
        results: Mutex<VecDeque<Result<AskResponse, AskError>>>,
        questions: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(results: Vec<Result<AskResponse, AskError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                questions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AskTransport for ScriptedTransport {
        async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AskError> {
            self.questions
                .lock()
                .unwrap()
                .push(request.question().to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }
    }

    #[test]
    fn empty_question_is_rejected_before_any_transition() {
        let mut c = SessionController::new();
        assert!(c.begin_submit("").is_none());
        assert!(c.begin_submit("   ").is_none());
        assert_eq!(c.state(), Lifecycle::Idle);
        assert!(c.error().is_none());
        assert_eq!(c.last_question(), "");
    }

    #[test]
    fn begin_submit_clears_error_and_closes_panel() {
        let mut c = SessionController::new();
        let p = c.begin_submit("first").unwrap();
        c.complete(p.generation, Err(service_error("boom")));
        assert!(c.error().is_some());
        c.toggle_tab(PanelTab::ThoughtProcess, 0);

        let p = c.begin_submit("second").unwrap();
        assert!(c.error().is_none());
        assert!(!c.focus().is_open());
        assert_eq!(c.state(), Lifecycle::Submitting);
        assert_eq!(p.request.question(), "second");
    }

    #[test]
    fn history_grows_by_one_per_success() {
        let mut c = SessionController::new();
        for i in 0..4 {
            let p = c.begin_submit(&format!("q{i}")).unwrap();
            assert!(c.complete(p.generation, Ok(response("a"))));
        }
        assert_eq!(c.turns().len(), 4);
        c.clear();
        assert_eq!(c.turns().len(), 0);
    }

    #[test]
    fn request_payload_carries_history_plus_pending() {
        let mut c = SessionController::new();
        let p = c.begin_submit("q1").unwrap();
        c.complete(p.generation, Ok(response("a1")));

        let p = c.begin_submit("q2").unwrap();
        assert_eq!(p.request.history.len(), 2);
        assert_eq!(p.request.history[0].bot.as_deref(), Some("a1"));
        assert!(p.request.history[1].bot.is_none());
    }

    #[test]
    fn last_write_wins_under_overlap() {
        let mut c = SessionController::new();
        let a = c.begin_submit("A").unwrap();
        let b = c.begin_submit("B").unwrap();

        // B resolves first and lands.
        assert!(c.complete(b.generation, Ok(response("answer B"))));
        // A resolves late — discarded, history reflects only B.
        assert!(!c.complete(a.generation, Ok(response("answer A"))));

        assert_eq!(c.turns().len(), 1);
        assert_eq!(c.turns()[0].question, "B");
        assert_eq!(c.turns()[0].response.answer, "answer B");
        assert_eq!(c.state(), Lifecycle::Idle);
    }

    #[test]
    fn superseded_failure_does_not_surface() {
        let mut c = SessionController::new();
        let a = c.begin_submit("A").unwrap();
        let b = c.begin_submit("B").unwrap();
        assert!(!c.complete(a.generation, Err(service_error("stale failure"))));
        assert!(c.error().is_none());
        assert!(c.complete(b.generation, Ok(response("ok"))));
        assert_eq!(c.turns().len(), 1);
    }

    #[test]
    fn failure_keeps_question_for_retry() {
        let mut c = SessionController::new();
        let p = c.begin_submit("X").unwrap();
        c.complete(p.generation, Err(service_error("502 from gateway")));

        assert_eq!(c.state(), Lifecycle::Failed);
        assert_eq!(c.turns().len(), 0);
        assert_eq!(c.last_question(), "X");
        let err = c.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Service);
        assert!(err.detail.contains("502 from gateway"));

        let retry = c.begin_retry().unwrap();
        assert_eq!(retry.request.question(), "X");
        c.complete(retry.generation, Ok(response("recovered")));
        assert_eq!(c.turns().len(), 1);
        assert!(c.error().is_none());
        assert_eq!(c.state(), Lifecycle::Idle);
    }

    #[test]
    fn retry_without_prior_question_is_a_noop() {
        let mut c = SessionController::new();
        assert!(c.begin_retry().is_none());
        assert_eq!(c.state(), Lifecycle::Idle);
    }

    #[test]
    fn clear_resets_everything_and_strands_inflight() {
        let mut c = SessionController::new();
        let p = c.begin_submit("q1").unwrap();
        c.complete(p.generation, Ok(response("a1")));
        c.show_citation("doc.pdf", 0);

        let inflight = c.begin_submit("q2").unwrap();
        c.clear();

        assert_eq!(c.state(), Lifecycle::Idle);
        assert!(c.turns().is_empty());
        assert!(c.error().is_none());
        assert_eq!(c.last_question(), "");
        assert_eq!(*c.focus(), FocusState::default());
        assert!(!c.can_clear());

        // The stranded completion must not resurrect the cleared session.
        assert!(!c.complete(inflight.generation, Ok(response("late"))));
        assert!(c.turns().is_empty());
    }

    #[test]
    fn duplicate_completion_is_not_applied_twice() {
        let mut c = SessionController::new();
        let p = c.begin_submit("q").unwrap();
        assert!(c.complete(p.generation, Ok(response("a"))));
        assert!(!c.complete(p.generation, Ok(response("a again"))));
        assert_eq!(c.turns().len(), 1);
    }

    #[test]
    fn clear_gating_follows_last_question_and_busy() {
        let mut c = SessionController::new();
        assert!(!c.can_clear());
        let p = c.begin_submit("q").unwrap();
        assert!(!c.can_clear()); // busy
        c.complete(p.generation, Ok(response("a")));
        assert!(c.can_clear());
    }

    #[tokio::test]
    async fn inline_submit_success_scenario() {
        let transport =
            ScriptedTransport::new(vec![Ok(response("$10/mo [doc1]"))]);
        let mut c = SessionController::new();

        assert!(c.submit(&transport, "What is the price?").await);

        assert_eq!(c.turns().len(), 1);
        let turn = &c.turns()[0];
        assert_eq!(turn.question, "What is the price?");
        assert_eq!(turn.response.answer, "$10/mo [doc1]");
        assert_eq!(turn.response.citations(), vec!["doc1"]);
        assert_eq!(c.focus().panel, ActivePanel::None);
        assert_eq!(c.state(), Lifecycle::Idle);
    }

    #[tokio::test]
    async fn inline_submit_failure_then_retry_succeeds() {
        let transport = ScriptedTransport::new(vec![
            Err(service_error("search index unavailable")),
            Ok(response("here you go")),
        ]);
        let mut c = SessionController::new();

        c.submit(&transport, "X").await;
        assert!(c.error().is_some());
        assert_eq!(c.turns().len(), 0);
        assert_eq!(c.last_question(), "X");

        let retry = c.begin_retry().unwrap();
        let result = transport.ask(&retry.request).await;
        c.complete(retry.generation, result);

        assert_eq!(c.turns().len(), 1);
        assert!(c.error().is_none());
        let questions = transport.questions.lock().unwrap();
        assert_eq!(*questions, vec!["X".to_string(), "X".to_string()]);
    }

    #[tokio::test]
    async fn inline_submit_rejects_empty_question() {
        let transport = ScriptedTransport::new(vec![]);
        let mut c = SessionController::new();
        assert!(!c.submit(&transport, "  ").await);
    }
}

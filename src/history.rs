/// Conversation turn history.
///
/// One `Turn` is a user question paired with the completed backend response.
/// The history only ever holds completed turns — a question that is still in
/// flight lives in the request lifecycle (`session.rs`), not here. Indices are
/// stable once assigned: turns are never reordered or individually removed,
/// only the whole history can be cleared.
use serde::{Deserialize, Serialize};

use crate::client::AskResponse;

// ── Turn ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub response: AskResponse,
}

// ── History ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Append a completed turn. Returns its index (always `len - 1`).
    pub fn append(&mut self, question: String, response: AskResponse) -> usize {
        self.turns.push(Turn { question, response });
        self.turns.len() - 1
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Question of the most recent completed turn, or empty.
    pub fn last_question(&self) -> &str {
        self.turns.last().map(|t| t.question.as_str()).unwrap_or("")
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(answer: &str) -> AskResponse {
        AskResponse {
            answer: answer.to_string(),
            thoughts: None,
            data_points: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn append_returns_new_index() {
        let mut h = History::default();
        assert_eq!(h.append("q1".into(), response("a1")), 0);
        assert_eq!(h.append("q2".into(), response("a2")), 1);
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).unwrap().question, "q1");
        assert_eq!(h.get(1).unwrap().response.answer, "a2");
    }

    #[test]
    fn last_question_empty_when_no_turns() {
        let mut h = History::default();
        assert_eq!(h.last_question(), "");
        h.append("what is the price?".into(), response("$10"));
        assert_eq!(h.last_question(), "what is the price?");
    }

    #[test]
    fn clear_empties_regardless_of_length() {
        let mut h = History::default();
        for i in 0..5 {
            h.append(format!("q{i}"), response("a"));
        }
        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.last_question(), "");
    }
}

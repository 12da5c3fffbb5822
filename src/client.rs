use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::history::Turn;
use crate::overrides::AnswerOverrides;

// ── Wire types ────────────────────────────────────────────────────────────────

/// One (user, bot) pair in the request history. `bot: None` marks the pending
/// question the backend is being asked to answer — always the final entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
}

/// Answer-generation overrides as the backend expects them. Empty-string
/// fields from the settings store are omitted entirely rather than sent as
/// spurious empty filters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_filter: Option<String>,
    pub top: u32,
    pub semantic_ranker: bool,
    pub semantic_captions: bool,
    pub suggest_followup_questions: bool,
    #[serde(rename = "conversationstyleoption")]
    pub conversation_style: String,
    #[serde(rename = "indexoption")]
    pub index: String,
}

/// Read-retrieve-read, the only approach this client speaks.
const APPROACH: &str = "rrr";

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub history: Vec<ChatTurn>,
    pub approach: &'static str,
    pub overrides: RequestOverrides,
}

impl AskRequest {
    /// Build the payload for `question`: completed turns first, then the
    /// pending entry, plus a snapshot of the current overrides.
    pub fn build(turns: &[Turn], question: &str, overrides: &AnswerOverrides) -> Self {
        let mut history: Vec<ChatTurn> = turns
            .iter()
            .map(|t| ChatTurn {
                user: t.question.clone(),
                bot: Some(t.response.answer.clone()),
            })
            .collect();
        history.push(ChatTurn {
            user: question.to_string(),
            bot: None,
        });

        Self {
            history,
            approach: APPROACH,
            overrides: RequestOverrides {
                prompt_template: unset_if_empty(overrides.prompt_template()),
                exclude_category: unset_if_empty(overrides.exclude_category()),
                stock_filter: unset_if_empty(overrides.stock_filter()),
                top: overrides.retrieval_count(),
                semantic_ranker: overrides.use_semantic_ranker,
                semantic_captions: overrides.use_semantic_captions,
                suggest_followup_questions: overrides.suggest_followups,
                conversation_style: overrides.conversation_style.wire_value().to_string(),
                index: overrides.index.wire_value().to_string(),
            },
        }
    }

    /// The pending question this request carries.
    pub fn question(&self) -> &str {
        self.history.last().map(|t| t.user.as_str()).unwrap_or("")
    }
}

fn unset_if_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Backend answer payload. Treated as immutable once received; citations and
/// follow-up questions are markers embedded in `answer` and extracted on
/// demand by the helpers below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    /// Reasoning trace for the thought-process panel (HTML-ish text).
    #[serde(default)]
    pub thoughts: Option<String>,
    /// Supporting passages, "source.ext: excerpt" per entry.
    #[serde(default)]
    pub data_points: Vec<String>,
    /// Backend-reported failure; a present, non-empty value means the request
    /// did not actually produce an answer.
    #[serde(default)]
    pub error: Option<String>,
}

impl AskResponse {
    /// Citation references, `[like-this.pdf]`, deduplicated in first-seen
    /// order so their display indices are stable.
    pub fn citations(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for marker in bracket_markers(&self.answer, '[', ']') {
            if !seen.iter().any(|c| c == marker) {
                seen.push(marker.to_string());
            }
        }
        seen
    }

    /// Follow-up questions, `<<like this?>>`, in answer order.
    pub fn followup_questions(&self) -> Vec<String> {
        angle_markers(&self.answer)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Answer with the follow-up markers stripped out (they render as their
    /// own affordance, not as prose).
    pub fn answer_text(&self) -> String {
        let mut out = String::with_capacity(self.answer.len());
        let mut rest = self.answer.as_str();
        while let Some(start) = rest.find("<<") {
            match rest[start + 2..].find(">>") {
                Some(end) => {
                    out.push_str(&rest[..start]);
                    rest = &rest[start + 2 + end + 2..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out.trim().to_string()
    }
}

/// Single-char-delimited markers: `[ref]`. Nested or empty brackets are
/// skipped, matching how the answers are actually written.
fn bracket_markers(text: &str, open: char, close: char) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len_utf8()..];
        match after.find(close) {
            Some(end) => {
                let inner = &after[..end];
                if !inner.is_empty() && !inner.contains(open) {
                    found.push(inner);
                }
                rest = &after[end + close.len_utf8()..];
            }
            None => break,
        }
    }
    found
}

/// `<<question>>` markers.
fn angle_markers(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<<") {
        let after = &rest[start + 2..];
        match after.find(">>") {
            Some(end) => {
                let inner = after[..end].trim();
                if !inner.is_empty() {
                    found.push(inner);
                }
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    found
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Submission failures, split by where they happened. All of these surface in
/// the session as a captured error with the cause text preserved — none of
/// them are fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered, but not with an answer.
    #[error("service error ({status}): {detail}")]
    Service { status: u16, detail: String },
    /// 2xx with a body this client cannot decode.
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// The one asynchronous boundary of the whole client. The session controller
/// only ever sees this trait; tests script it, the TUI and CLI hand it an
/// `ApiClient`.
#[async_trait]
pub trait AskTransport: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AskError>;
}

// ── ApiClient ─────────────────────────────────────────────────────────────────

pub struct ApiClient {
    http: reqwest::Client,
    pub endpoint: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: None,
            timeout: None,
        }
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    /// Per-request deadline. The session itself imposes none; this is the
    /// caller-supplied one from the profile config.
    pub fn set_timeout(&mut self, secs: u64) {
        self.timeout = Some(Duration::from_secs(secs));
    }
}

#[async_trait]
impl AskTransport for ApiClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, AskError> {
        let url = format!("{}/chat", self.endpoint.trim_end_matches('/'));

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        if let Some(t) = self.timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(AskError::Service {
                status: status.as_u16(),
                detail: body,
            });
        }

        let parsed: AskResponse = serde_json::from_str(&body)?;

        // A 2xx can still carry a backend-reported failure.
        if let Some(err) = parsed.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(AskError::Service {
                status: status.as_u16(),
                detail: err.to_string(),
            });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{ConversationStyle, SearchIndex};

    fn turn(q: &str, a: &str) -> Turn {
        Turn {
            question: q.to_string(),
            response: AskResponse {
                answer: a.to_string(),
                thoughts: None,
                data_points: Vec::new(),
                error: None,
            },
        }
    }

    #[test]
    fn request_history_ends_with_pending_entry() {
        let turns = vec![turn("q1", "a1"), turn("q2", "a2")];
        let req = AskRequest::build(&turns, "q3", &AnswerOverrides::default());
        assert_eq!(req.history.len(), 3);
        assert_eq!(req.history[0].bot.as_deref(), Some("a1"));
        assert_eq!(req.history[2].user, "q3");
        assert!(req.history[2].bot.is_none());
        assert_eq!(req.question(), "q3");
    }

    #[test]
    fn empty_override_strings_are_omitted_on_the_wire() {
        let req = AskRequest::build(&[], "q", &AnswerOverrides::default());
        let v = serde_json::to_value(&req).unwrap();
        let o = &v["overrides"];
        assert!(o.get("promptTemplate").is_none());
        assert!(o.get("excludeCategory").is_none());
        assert!(o.get("stockFilter").is_none());
        assert_eq!(o["top"], 3);
        assert_eq!(o["semanticRanker"], true);
        assert_eq!(o["suggestFollowupQuestions"], false);
        assert_eq!(o["conversationstyleoption"], "Balance");
        assert_eq!(o["indexoption"], "Default");
        assert_eq!(v["approach"], "rrr");
    }

    #[test]
    fn set_override_strings_are_sent() {
        let mut overrides = AnswerOverrides::default();
        overrides.set_exclude_category("internal");
        overrides.set_prompt_template("Be terse.");
        overrides.conversation_style = ConversationStyle::Precise;
        overrides.index = SearchIndex::Group2;
        let req = AskRequest::build(&[], "q", &overrides);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["overrides"]["excludeCategory"], "internal");
        assert_eq!(v["overrides"]["promptTemplate"], "Be terse.");
        assert_eq!(v["overrides"]["conversationstyleoption"], "Precise");
        assert_eq!(v["overrides"]["indexoption"], "Group 2");
    }

    #[test]
    fn citations_dedupe_in_first_seen_order() {
        let r = AskResponse {
            answer: "Speeds up to 21Mbps [plans.pdf]. Pricing in [pricing.pdf], \
                     see also [plans.pdf]."
                .to_string(),
            thoughts: None,
            data_points: Vec::new(),
            error: None,
        };
        assert_eq!(r.citations(), vec!["plans.pdf", "pricing.pdf"]);
    }

    #[test]
    fn followups_extracted_and_stripped_from_answer_text() {
        let r = AskResponse {
            answer: "The plan costs $10/mo [pricing.pdf].<<Is there a family plan?>>\
                     <<What about roaming?>>"
                .to_string(),
            thoughts: None,
            data_points: Vec::new(),
            error: None,
        };
        assert_eq!(
            r.followup_questions(),
            vec!["Is there a family plan?", "What about roaming?"]
        );
        assert_eq!(r.answer_text(), "The plan costs $10/mo [pricing.pdf].");
    }

    #[test]
    fn empty_and_unclosed_markers_are_ignored() {
        let r = AskResponse {
            answer: "empty [] and unclosed [ref plus <<dangling".to_string(),
            thoughts: None,
            data_points: Vec::new(),
            error: None,
        };
        assert!(r.citations().is_empty());
        assert!(r.followup_questions().is_empty());
    }

    #[test]
    fn response_parses_with_missing_optional_fields() {
        let r: AskResponse = serde_json::from_str(r#"{"answer":"hi"}"#).unwrap();
        assert_eq!(r.answer, "hi");
        assert!(r.thoughts.is_none());
        assert!(r.data_points.is_empty());
        assert!(r.error.is_none());
    }
}

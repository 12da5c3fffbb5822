/// Telemetry — usage stats, persisted to `~/.local/share/parley/telemetry.jsonl`.
///
/// Stats are:
/// - Accumulated live in AppState during a TUI session
/// - Flushed to disk after every completed request cycle (answer or failure)
/// - Summarised in the settings view
///
/// The JSONL format keeps one record per completed cycle, enabling
/// aggregation across sessions.
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

// ── Storage path ──────────────────────────────────────────────────────────────

fn telemetry_path() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".local/share")
        });
    base.join("parley").join("telemetry.jsonl")
}

// ── Per-question record (one line in telemetry.jsonl) ─────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub timestamp: i64,
    pub session_id: String,
    /// First 80 chars of the question
    pub question_preview: String,
    /// "ok" or "error"
    pub outcome: String,
    /// True when this cycle was a retry of the previous question
    pub retried: bool,
    /// Citations in the answer (0 on failure)
    pub citations: usize,
    /// Wall-clock milliseconds from submit to completion
    pub duration_ms: u64,
    pub profile: String,
    pub index: String,
}

// ── Live session stats (held in AppState, reset on clear) ─────────────────────

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Completed request cycles this session (answers + failures)
    pub questions_asked: usize,
    pub answers_received: usize,
    pub failures: usize,
    pub retries: usize,
}

impl SessionStats {
    /// Record a completed cycle. Returns the record for persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn record_question(
        &mut self,
        session_id: &str,
        question: &str,
        ok: bool,
        retried: bool,
        citations: usize,
        duration_ms: u64,
        profile: &str,
        index: &str,
    ) -> QuestionRecord {
        self.questions_asked += 1;
        if ok {
            self.answers_received += 1;
        } else {
            self.failures += 1;
        }
        if retried {
            self.retries += 1;
        }

        QuestionRecord {
            timestamp: Utc::now().timestamp(),
            session_id: session_id.to_string(),
            question_preview: question.chars().take(80).collect(),
            outcome: if ok { "ok" } else { "error" }.to_string(),
            retried,
            citations,
            duration_ms,
            profile: profile.to_string(),
            index: index.to_string(),
        }
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Append one record to the telemetry file. Failures here are ignored by
/// callers — telemetry must never break a session.
pub fn append_record(record: &QuestionRecord) -> Result<()> {
    let path = telemetry_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{}", serde_json::to_string(record)?)?;
    Ok(())
}

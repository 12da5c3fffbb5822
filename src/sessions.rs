/// Session persistence.
///
/// Each TUI session is stored as a JSONL file in
/// `~/.local/share/parley/sessions/`, one line per completed turn (question +
/// full backend response). On startup the most recent session for the current
/// directory is replayed into the display so the user can see where they left
/// off; replayed turns are display-only and are not resubmitted or fed back
/// into the live conversation.
use std::cmp::Reverse;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::client::AskResponse;

// ── StoredTurn ────────────────────────────────────────────────────────────────

/// One completed turn as persisted. The full response is kept so a resumed
/// session can still show answers with their citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    /// 0-based index within this session
    pub turn_index: usize,
    /// Unix timestamp (seconds) when the turn completed
    pub timestamp: i64,
    pub question: String,
    pub response: AskResponse,
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session {
    /// "{unix_ts}_{cwd_basename}"
    pub id: String,
    /// Path to the JSONL file on disk
    pub path: PathBuf,
    /// Turns written so far in this session
    pub turn_count: usize,
}

// ── Directory helpers ─────────────────────────────────────────────────────────

pub fn sessions_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default())
                .join(".local/share")
        })
        .join("parley/sessions")
}

fn cwd_basename(cwd: &str) -> &str {
    Path::new(cwd)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

/// Create a new empty session and ensure the sessions directory exists.
pub fn open_session(cwd: &str) -> Result<Session> {
    let dir = sessions_dir();
    std::fs::create_dir_all(&dir)?;

    let ts = chrono::Utc::now().timestamp();
    let basename = cwd_basename(cwd);
    let id = format!("{ts}_{basename}");
    let path = dir.join(format!("{id}.jsonl"));

    Ok(Session {
        id,
        path,
        turn_count: 0,
    })
}

/// Append a single turn to the JSONL file (one line = one turn).
/// Called right after a turn completes so data survives crashes.
pub fn append_turn(path: &Path, turn: &StoredTurn) -> Result<()> {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(turn)?;
    writeln!(f, "{line}")?;
    Ok(())
}

/// Load all turns from an existing session JSONL file.
pub fn load_session_turns(path: &Path) -> Result<Vec<StoredTurn>> {
    let content = std::fs::read_to_string(path)?;
    let turns = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(serde_json::from_str::<StoredTurn>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(turns)
}

/// List all session files in the sessions directory, sorted newest-first.
/// Returns (session_id, path) pairs.
pub fn list_sessions() -> Result<Vec<(String, PathBuf)>> {
    list_in_dir(&sessions_dir())
}

fn list_in_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .filter(|e| e.path().extension().map(|x| x == "jsonl").unwrap_or(false))
        .collect();
    // Sort by filename descending (timestamp prefix makes this newest-first)
    entries.sort_by_key(|e| Reverse(e.file_name()));
    Ok(entries
        .iter()
        .map(|e| {
            let name = e
                .file_name()
                .to_string_lossy()
                .trim_end_matches(".jsonl")
                .to_string();
            (name, e.path())
        })
        .collect())
}

/// Find the most recent session file whose name ends with `_{cwd_basename}`.
/// Returns (session_id, path) if found.
pub fn find_latest_for_cwd(cwd: &str) -> Option<(String, PathBuf)> {
    let suffix = format!("_{}", cwd_basename(cwd));
    list_sessions()
        .ok()?
        .into_iter()
        .find(|(id, _)| id.ends_with(&suffix))
}

/// Keep only the `keep` most recent sessions; delete older files.
pub fn prune_old_sessions(keep: usize) {
    let _ = prune_in_dir(&sessions_dir(), keep);
}

fn prune_in_dir(dir: &Path, keep: usize) -> Result<()> {
    let sessions = list_in_dir(dir)?;
    for (_, path) in sessions.into_iter().skip(keep) {
        let _ = std::fs::remove_file(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(index: usize, question: &str, answer: &str) -> StoredTurn {
        StoredTurn {
            turn_index: index,
            timestamp: 1_700_000_000 + index as i64,
            question: question.to_string(),
            response: AskResponse {
                answer: answer.to_string(),
                thoughts: Some("looked it up".to_string()),
                data_points: vec!["plans.pdf: 21Mbps".to_string()],
                error: None,
            },
        }
    }

    #[test]
    fn append_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("123_proj.jsonl");

        append_turn(&path, &stored(0, "q1", "a1 [plans.pdf]")).unwrap();
        append_turn(&path, &stored(1, "q2", "a2")).unwrap();

        let turns = load_session_turns(&path).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].question, "q1");
        assert_eq!(turns[0].response.citations(), vec!["plans.pdf"]);
        assert_eq!(turns[1].turn_index, 1);
        assert_eq!(turns[1].response.data_points.len(), 1);
    }

    #[test]
    fn list_is_newest_first_and_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for ts in [100, 300, 200] {
            let path = dir.path().join(format!("{ts}_proj.jsonl"));
            append_turn(&path, &stored(0, "q", "a")).unwrap();
        }

        let listed = list_in_dir(dir.path()).unwrap();
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["300_proj", "200_proj", "100_proj"]);

        prune_in_dir(dir.path(), 1).unwrap();
        let listed = list_in_dir(dir.path()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "300_proj");
    }
}

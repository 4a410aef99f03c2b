// ABOUTME: Session store — the current intent file plus immutable history snapshots.
// ABOUTME: Writes are atomic (tmp + rename); history entries are created once and never rewritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, Utc};
use serde::Serialize;

use super::types::Session;

pub const INTENT_DIR_NAME: &str = ".intent";
pub const CURRENT_FILE_NAME: &str = "current_intent.json";
const HISTORY_PREFIX: &str = "intent_";

/// Score context taken from a closed session, fed to the oracle for calibration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryHint {
    pub intent: String,
    pub score: Option<u8>,
    pub commits: usize,
}

/// Handle on one intent directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at an explicit directory. Nothing is created until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_FILE_NAME)
    }

    /// The active session, if there is one.
    ///
    /// A missing, unreadable, or unparsable file counts as "no session", and so
    /// does a session that has already been closed.
    pub fn load_current(&self) -> Option<Session> {
        let path = self.current_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read current intent");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&content) {
            Ok(session) if session.is_active() => Some(session),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "current intent is not valid JSON");
                None
            }
        }
    }

    /// Persist `session` as current. A closed session is also snapshotted into
    /// history; the snapshot path is returned.
    pub fn save(&self, session: &Session) -> anyhow::Result<Option<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let content = serde_json::to_string_pretty(session)?;
        let path = self.current_path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;

        if session.is_active() {
            return Ok(None);
        }

        let history_path = self.write_history(session, &content)?;
        tracing::debug!(path = %history_path.display(), "wrote history snapshot");
        Ok(Some(history_path))
    }

    /// Create a new history entry named after the close time. Same-second
    /// closes get a numeric suffix instead of replacing an earlier entry.
    fn write_history(&self, session: &Session, content: &str) -> anyhow::Result<PathBuf> {
        let closed_at = session.closed_at.unwrap_or_else(Utc::now);
        let stem = format!(
            "{}{}",
            HISTORY_PREFIX,
            closed_at.with_timezone(&Local).format("%Y%m%d_%H%M%S")
        );

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to create {}", path.display()));
                }
            }
        }
    }

    /// Paths of all history entries, most recent first.
    pub fn history_paths(&self) -> Vec<PathBuf> {
        let Some(dir) = self.dir.to_str() else {
            return Vec::new();
        };
        let pattern = format!(
            "{}/{HISTORY_PREFIX}*.json",
            glob::Pattern::escape(dir.trim_end_matches('/'))
        );
        let mut paths: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(entries) => entries.filter_map(Result::ok).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "invalid history glob");
                return Vec::new();
            }
        };
        paths.sort_by_cached_key(|path| std::cmp::Reverse(history_order(path)));
        paths
    }

    /// Up to `limit` readable history entries, most recent first.
    pub fn history(&self, limit: usize) -> Vec<Session> {
        self.history_paths()
            .into_iter()
            .take(limit)
            .filter_map(|path| {
                let content = fs::read_to_string(&path).ok()?;
                match serde_json::from_str(&content) {
                    Ok(session) => Some(session),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "skipping history entry");
                        None
                    }
                }
            })
            .collect()
    }

    /// Scores from the most recent closed sessions.
    pub fn recent_scores(&self, limit: usize) -> Vec<HistoryHint> {
        self.history(limit)
            .into_iter()
            .map(|session| HistoryHint {
                score: session.first_score(),
                commits: session.commits.len(),
                intent: session.intent_text,
            })
            .collect()
    }
}

/// Sort key for a history file: its timestamp, then its collision suffix
/// compared numerically so `_10` lands after `_9`.
fn history_order(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(HISTORY_PREFIX))
        .unwrap_or_default();
    match stem.rsplit_once('_') {
        // `YYYYMMDD_HHMMSS_n`: the stamp itself contains one underscore.
        Some((stamp, suffix)) if stamp.contains('_') => match suffix.parse() {
            Ok(n) => (stamp.to_string(), n),
            Err(_) => (stem.to_string(), 0),
        },
        _ => (stem.to_string(), 0),
    }
}

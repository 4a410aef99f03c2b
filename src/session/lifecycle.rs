// ABOUTME: Session lifecycle — start, record commits, and close an intent session.
// ABOUTME: Transitions none → active → closed over an explicit SessionStore handle.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::store::SessionStore;
use super::types::{CommitRecord, Session, SessionStatus};
use crate::oracle::{AlignmentReport, VulnerabilityReport};

/// Result of asking to start a new session.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started(Session),
    /// A session is already active; it was left untouched.
    AlreadyActive(Session),
}

/// Result of recording a commit against the active session.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The commit was appended; the caller may proceed with the real commit.
    Recorded(Session),
    /// The attempt was appended for audit, but a critical finding means the
    /// caller must not perform the real commit.
    Blocked(Session),
    NoActiveSession,
}

/// Result of closing the active session.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(CloseSummary),
    NoActiveSession,
}

/// What a closed session amounted to.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSummary {
    pub intent: String,
    pub started_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    /// Commit messages, numbered from 1 in the order they were made.
    pub commits: Vec<(usize, String)>,
    pub history_path: Option<PathBuf>,
}

impl CloseSummary {
    fn from_session(session: &Session, closed_at: DateTime<Utc>, history_path: Option<PathBuf>) -> Self {
        Self {
            intent: session.intent_text.clone(),
            started_at: session.started_at,
            closed_at,
            commits: session
                .commits
                .iter()
                .enumerate()
                .map(|(i, c)| (i + 1, c.message.clone()))
                .collect(),
            history_path,
        }
    }
}

impl fmt::Display for CloseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "Intent Session Summary")?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Intent: {}", self.intent)?;
        writeln!(f, "Started: {}", self.started_at.to_rfc3339())?;
        writeln!(f, "Closed: {}", self.closed_at.to_rfc3339())?;
        writeln!(f)?;
        write!(f, "Commits made: {}", self.commits.len())?;
        for (index, message) in &self.commits {
            write!(f, "\n  {index}. {message}")?;
        }
        Ok(())
    }
}

/// Whether a scan result forbids the version-control commit.
pub fn blocks_commit(security: Option<&VulnerabilityReport>) -> bool {
    security.is_some_and(|report| report.severity.is_blocking())
}

/// Drives session state transitions through a store.
pub struct Lifecycle<'a> {
    store: &'a SessionStore,
}

impl<'a> Lifecycle<'a> {
    pub fn new(store: &'a SessionStore) -> Self {
        Self { store }
    }

    pub fn current(&self) -> Option<Session> {
        self.store.load_current()
    }

    /// Begin a session for `intent_text` unless one is already active.
    pub fn start(&self, intent_text: &str) -> anyhow::Result<StartOutcome> {
        if let Some(existing) = self.store.load_current() {
            return Ok(StartOutcome::AlreadyActive(existing));
        }
        let session = Session::new(intent_text);
        self.store.save(&session)?;
        tracing::info!(intent = %session.intent_text, "intent session started");
        Ok(StartOutcome::Started(session))
    }

    /// Append a commit record to the active session.
    pub fn record_commit(
        &self,
        message: &str,
        validation: Option<AlignmentReport>,
        security: Option<VulnerabilityReport>,
    ) -> anyhow::Result<CommitOutcome> {
        let Some(mut session) = self.store.load_current() else {
            return Ok(CommitOutcome::NoActiveSession);
        };

        let blocked = blocks_commit(security.as_ref());

        let mut record = CommitRecord::new(message);
        record.validation = validation;
        record.security = security;
        record.blocked = blocked;
        session.commits.push(record);
        self.store.save(&session)?;

        if blocked {
            tracing::warn!(commit = message, "commit blocked by critical security finding");
            Ok(CommitOutcome::Blocked(session))
        } else {
            tracing::info!(commit = message, commits = session.commits.len(), "commit recorded");
            Ok(CommitOutcome::Recorded(session))
        }
    }

    /// Close the active session and snapshot it into history.
    pub fn close(&self) -> anyhow::Result<CloseOutcome> {
        let Some(mut session) = self.store.load_current() else {
            return Ok(CloseOutcome::NoActiveSession);
        };

        let closed_at = Utc::now();
        session.status = SessionStatus::Closed;
        session.closed_at = Some(closed_at);
        let history_path = self.store.save(&session)?;
        tracing::info!(intent = %session.intent_text, "intent session closed");

        Ok(CloseOutcome::Closed(CloseSummary::from_session(
            &session,
            closed_at,
            history_path,
        )))
    }
}

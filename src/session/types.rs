// ABOUTME: Session and commit record types persisted in the .intent directory.
// ABOUTME: A session is active until closed; its commit list only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oracle::{AlignmentReport, Severity, VulnerabilityReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// One commit attempt made while a session was active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub validation: Option<AlignmentReport>,
    #[serde(default)]
    pub security: Option<VulnerabilityReport>,
    /// Recorded for audit, but the version-control commit was refused.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

impl CommitRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            validation: None,
            security: None,
            blocked: false,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.security.as_ref().map(|s| s.severity)
    }
}

/// The record tracking one intent from start to close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "message", alias = "intent_text")]
    pub intent_text: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
}

impl Session {
    /// Create a new active session with no commits.
    pub fn new(intent_text: impl Into<String>) -> Self {
        Self {
            intent_text: intent_text.into(),
            started_at: Utc::now(),
            closed_at: None,
            status: SessionStatus::Active,
            commits: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// First alignment score recorded in this session, if any.
    pub fn first_score(&self) -> Option<u8> {
        self.commits
            .iter()
            .find_map(|c| c.validation.as_ref().map(|v| v.score))
    }
}

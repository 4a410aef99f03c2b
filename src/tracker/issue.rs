// ABOUTME: Issue IDs and stories — extraction from commit messages and formatting for validation.
// ABOUTME: IDs look like PROJ-123; the first one in a message keys the issue lookup.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ISSUE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,10}-\d+)\b").expect("issue id pattern compiles"));

/// The first issue ID mentioned in `text`.
pub fn extract_issue_id(text: &str) -> Option<String> {
    ISSUE_ID
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every distinct issue ID in `text`, in first-seen order.
pub fn extract_issue_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for capture in ISSUE_ID.captures_iter(text) {
        let id = &capture[1];
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Commit message must include an issue ID (e.g., PROJ-123)")]
pub struct MissingIssueId;

/// Require an issue ID in a commit message, returning it.
pub fn check_commit_message(message: &str) -> Result<String, MissingIssueId> {
    extract_issue_id(message).ok_or(MissingIssueId)
}

/// A story fetched from the issue tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub acceptance_criteria: String,
    pub labels: Vec<String>,
    pub components: Vec<String>,
}

impl Issue {
    /// The story rendered as intent text for the oracle.
    pub fn validation_text(&self) -> String {
        let mut parts = vec![
            format!("Jira Story: {} - {}", self.key, self.summary),
            format!("Type: {}", self.issue_type),
            format!("Status: {}", self.status),
        ];
        if !self.description.is_empty() {
            parts.push(format!("\nDescription:\n{}", self.description));
        }
        if !self.acceptance_criteria.is_empty() {
            parts.push(format!("\nAcceptance Criteria:\n{}", self.acceptance_criteria));
        }
        if !self.components.is_empty() {
            parts.push(format!("\nComponents: {}", self.components.join(", ")));
        }
        parts.join("\n")
    }
}

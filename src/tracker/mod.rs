// ABOUTME: Issue tracker module — issue-ID extraction and the Jira story client.
// ABOUTME: Stories are turned into intent text so the oracle can judge diffs against them.

pub mod issue;
pub mod jira;

pub use issue::{Issue, MissingIssueId, check_commit_message, extract_issue_id, extract_issue_ids};
pub use jira::{IssueTracker, JiraClient, TrackerError};

// ABOUTME: Jira REST client — fetches a story and flattens its Atlassian Document Format text.
// ABOUTME: Credentials come from JIRA_URL / JIRA_EMAIL / JIRA_API_TOKEN (url and email may be in config).

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use super::issue::Issue;
use crate::config::JiraConfig;

/// Errors raised while talking to the issue tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Jira credentials not found. Set JIRA_URL, JIRA_EMAIL, and JIRA_API_TOKEN")]
    MissingCredentials,
    #[error("Jira issue {0} not found")]
    NotFound(String),
    #[error("Jira authentication failed. Check your credentials")]
    Unauthorized,
    #[error("failed to fetch Jira issue: HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("error fetching Jira issue: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything that can turn an issue key into a story.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn fetch_issue(&self, key: &str) -> Result<Issue, TrackerError>;
}

pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        email: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.into(),
            api_token: api_token.into(),
        })
    }

    /// Build a client from the environment, falling back to config for url and email.
    pub fn from_env(config: &JiraConfig, timeout: Duration) -> Result<Self, TrackerError> {
        Self::from_lookup(config, timeout, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        config: &JiraConfig,
        timeout: Duration,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TrackerError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let url = non_empty(lookup("JIRA_URL")).or_else(|| non_empty(config.url.clone()));
        let email = non_empty(lookup("JIRA_EMAIL")).or_else(|| non_empty(config.email.clone()));
        let token = non_empty(lookup("JIRA_API_TOKEN"));
        match (url, email, token) {
            (Some(url), Some(email), Some(token)) => Self::new(&url, email, token, timeout),
            _ => Err(TrackerError::MissingCredentials),
        }
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}/rest/api/3/issue/{}", self.base_url, key)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn fetch_issue(&self, key: &str) -> Result<Issue, TrackerError> {
        tracing::debug!(key, "fetching Jira issue");
        let response = self
            .client
            .get(self.issue_url(key))
            .basic_auth(&self.email, Some(&self.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(TrackerError::NotFound(key.to_string())),
            StatusCode::UNAUTHORIZED => return Err(TrackerError::Unauthorized),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(TrackerError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let data: Value = response.json().await?;
        Ok(parse_issue(&data))
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

/// Pull the fields used for validation out of a Jira issue payload.
pub fn parse_issue(data: &Value) -> Issue {
    let fields = data.get("fields").cloned().unwrap_or(Value::Null);
    let description = fields
        .get("description")
        .map(description_text)
        .unwrap_or_default();
    let acceptance_criteria = acceptance_criteria(&description);

    let assignee = fields
        .pointer("/assignee/displayName")
        .and_then(Value::as_str)
        .unwrap_or("Unassigned")
        .to_string();

    let strings = |key: &str| -> Vec<String> {
        fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().or_else(|| item.get("name")?.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Issue {
        key: str_at(data, "/key").to_string(),
        summary: str_at(&fields, "/summary").to_string(),
        description,
        issue_type: str_at(&fields, "/issuetype/name").to_string(),
        status: str_at(&fields, "/status/name").to_string(),
        priority: str_at(&fields, "/priority/name").to_string(),
        assignee,
        acceptance_criteria,
        labels: strings("labels"),
        components: strings("components"),
    }
}

/// Plain text for a description that may be ADF, a plain string, or absent.
pub fn description_text(description: &Value) -> String {
    match description {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => adf_to_text(description),
        other => other.to_string(),
    }
}

/// Flatten Atlassian Document Format into newline-separated blocks.
pub fn adf_to_text(node: &Value) -> String {
    let Some(obj) = node.as_object() else {
        return match node {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    };
    let children = || {
        obj.get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    };

    let parts: Vec<String> = match obj.get("type").and_then(Value::as_str) {
        Some("doc" | "heading" | "bulletList" | "orderedList" | "listItem") => {
            children().iter().map(adf_to_text).collect()
        }
        Some("paragraph") => {
            let runs: Vec<&str> = children()
                .iter()
                .filter(|c| c.get("type").and_then(Value::as_str) == Some("text"))
                .map(|c| c.get("text").and_then(Value::as_str).unwrap_or(""))
                .collect();
            vec![runs.join(" ")]
        }
        Some("text") => vec![obj.get("text").and_then(Value::as_str).unwrap_or("").to_string()],
        _ => Vec::new(),
    };

    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

static CRITERIA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)Acceptance Criteria:?\s*\n(.+?)(?:\n\n|\z)",
        r"(?is)AC:?\s*\n(.+?)(?:\n\n|\z)",
        r"(?is)Criteria:?\s*\n(.+?)(?:\n\n|\z)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("criteria pattern compiles"))
    .collect()
});

/// The block following an "Acceptance Criteria" style heading, up to the next blank line.
pub fn acceptance_criteria(description: &str) -> String {
    CRITERIA_PATTERNS
        .iter()
        .find_map(|re| re.captures(description))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "key": "PROJ-42",
            "fields": {
                "summary": "Add OAuth2 login",
                "issuetype": {"name": "Story"},
                "status": {"name": "In Progress"},
                "priority": {"name": "High"},
                "assignee": null,
                "labels": ["auth", "backend"],
                "components": [{"name": "api"}, {"name": "web"}],
                "description": {
                    "type": "doc",
                    "content": [
                        {"type": "paragraph", "content": [
                            {"type": "text", "text": "Users sign in"},
                            {"type": "text", "text": "with Google."}
                        ]},
                        {"type": "heading", "content": [
                            {"type": "text", "text": "Acceptance Criteria:"}
                        ]},
                        {"type": "bulletList", "content": [
                            {"type": "listItem", "content": [
                                {"type": "paragraph", "content": [{"type": "text", "text": "Login button shown"}]}
                            ]},
                            {"type": "listItem", "content": [
                                {"type": "paragraph", "content": [{"type": "text", "text": "Token stored"}]}
                            ]}
                        ]}
                    ]
                }
            }
        })
    }

    #[test]
    fn parses_issue_fields() {
        let issue = parse_issue(&sample_payload());
        assert_eq!(issue.key, "PROJ-42");
        assert_eq!(issue.summary, "Add OAuth2 login");
        assert_eq!(issue.issue_type, "Story");
        assert_eq!(issue.status, "In Progress");
        assert_eq!(issue.priority, "High");
        assert_eq!(issue.assignee, "Unassigned");
        assert_eq!(issue.labels, vec!["auth", "backend"]);
        assert_eq!(issue.components, vec!["api", "web"]);
    }

    #[test]
    fn flattens_adf() {
        let issue = parse_issue(&sample_payload());
        assert_eq!(
            issue.description,
            "Users sign in with Google.\nAcceptance Criteria:\nLogin button shown\nToken stored"
        );
    }

    #[test]
    fn finds_acceptance_criteria_after_heading() {
        let issue = parse_issue(&sample_payload());
        assert_eq!(issue.acceptance_criteria, "Login button shown\nToken stored");
    }

    #[test]
    fn criteria_stop_at_blank_line() {
        let text = "Intro\n\nacceptance criteria\n- one\n- two\n\nNotes after";
        assert_eq!(acceptance_criteria(text), "- one\n- two");
    }

    #[test]
    fn no_criteria_heading_yields_empty() {
        assert_eq!(acceptance_criteria("Just a description"), "");
    }

    #[test]
    fn plain_string_description_passes_through() {
        assert_eq!(description_text(&json!("legacy text")), "legacy text");
        assert_eq!(description_text(&Value::Null), "");
    }

    #[test]
    fn unknown_adf_nodes_are_dropped() {
        let node = json!({"type": "doc", "content": [
            {"type": "mediaSingle", "content": []},
            {"type": "paragraph", "content": [{"type": "text", "text": "kept"}]}
        ]});
        assert_eq!(adf_to_text(&node), "kept");
    }

    #[test]
    fn missing_credentials_is_typed() {
        let config = JiraConfig::default();
        let result = JiraClient::from_lookup(&config, Duration::from_secs(5), |_| None);
        assert!(matches!(result, Err(TrackerError::MissingCredentials)));
    }

    #[test]
    fn config_supplies_url_and_email() {
        let config = JiraConfig {
            url: Some("https://example.atlassian.net/".to_string()),
            email: Some("dev@example.com".to_string()),
        };
        let client = JiraClient::from_lookup(&config, Duration::from_secs(5), |key| {
            (key == "JIRA_API_TOKEN").then(|| "token".to_string())
        })
        .unwrap();
        assert_eq!(
            client.issue_url("PROJ-1"),
            "https://example.atlassian.net/rest/api/3/issue/PROJ-1"
        );
    }
}

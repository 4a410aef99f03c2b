// ABOUTME: Pull-request report — validates each referenced story against the range diff.
// ABOUTME: Produces a JSON result set and a markdown comment; low or unknown scores are critical.

use std::fmt::Write as _;

use serde::Serialize;

use crate::oracle::IntentValidator;
use crate::tracker::IssueTracker;

/// Scores below this mark a story as critically misaligned.
pub const CRITICAL_SCORE: u8 = 3;
const MAX_LISTED: usize = 3;

/// Validation outcome for one story referenced in the PR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryResult {
    pub issue_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub score: Option<u8>,
    pub confidence: u8,
    pub status: String,
    pub key_functionality_present: bool,
    pub matches: Vec<String>,
    pub discrepancies: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoryResult {
    fn failed(issue_id: &str, summary: Option<String>, error: String) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            summary,
            score: None,
            confidence: 0,
            status: "unknown".to_string(),
            key_functionality_present: false,
            matches: Vec::new(),
            discrepancies: Vec::new(),
            suggestions: Vec::new(),
            error: Some(error),
        }
    }

    /// A story we could not verify counts as critical, same as a low score.
    pub fn is_critical(&self) -> bool {
        self.error.is_some() || self.score.is_none_or(|s| s < CRITICAL_SCORE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrValidation {
    pub results: Vec<StoryResult>,
    pub critical_issues: bool,
}

/// Validate every story in `issue_ids` against `diff`.
pub async fn validate_stories(
    issue_ids: &[String],
    diff: &str,
    tracker: &dyn IssueTracker,
    validator: &IntentValidator,
) -> PrValidation {
    if issue_ids.is_empty() || diff.trim().is_empty() {
        return PrValidation {
            results: Vec::new(),
            critical_issues: false,
        };
    }

    let mut results = Vec::with_capacity(issue_ids.len());
    for issue_id in issue_ids {
        let issue = match tracker.fetch_issue(issue_id).await {
            Ok(issue) => issue,
            Err(e) => {
                tracing::warn!(issue = %issue_id, error = %e, "could not fetch story");
                results.push(StoryResult::failed(issue_id, None, e.to_string()));
                continue;
            }
        };

        let outcome = validator
            .score_alignment(&issue.validation_text(), diff)
            .await;
        let result = match outcome.ok() {
            Some(report) => StoryResult {
                issue_id: issue_id.clone(),
                summary: Some(issue.summary.clone()),
                score: Some(report.score),
                confidence: report.confidence,
                status: report.alignment.to_string(),
                key_functionality_present: report.key_functionality_present.unwrap_or(false),
                matches: report.matches.clone(),
                discrepancies: report.discrepancies.clone(),
                suggestions: report.suggestions.clone(),
                error: None,
            },
            None => StoryResult::failed(
                issue_id,
                Some(issue.summary.clone()),
                outcome.error().unwrap_or_default(),
            ),
        };
        results.push(result);
    }

    let critical_issues = results.iter().any(StoryResult::is_critical);
    PrValidation {
        results,
        critical_issues,
    }
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "**{title}:**");
    for item in items.iter().take(MAX_LISTED) {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

/// Markdown comment summarizing a PR validation.
pub fn render_comment(validation: &PrValidation) -> String {
    let mut out = String::from("## Jira Story Validation Report\n\n");
    if validation.results.is_empty() {
        out.push_str("No Jira IDs found in commit messages.");
        return out;
    }

    for result in &validation.results {
        if let Some(error) = &result.error {
            let _ = writeln!(out, "### {}\n**Error:** {}\n", result.issue_id, error);
            continue;
        }
        let summary = result.summary.as_deref().unwrap_or("");
        let score = result.score.unwrap_or(0);
        let _ = writeln!(out, "### {}: {}", result.issue_id, summary);
        let _ = writeln!(
            out,
            "**Alignment Score:** {}/10 (Confidence: {}%)",
            score, result.confidence
        );
        let _ = writeln!(out, "**Status:** {}", result.status);
        let _ = writeln!(
            out,
            "**Key Functionality Present:** {}\n",
            if result.key_functionality_present { "Yes" } else { "No" }
        );
        push_list(&mut out, "What Aligns", &result.matches);
        push_list(&mut out, "Discrepancies", &result.discrepancies);
        push_list(&mut out, "Suggestions", &result.suggestions);
    }

    let scores: Vec<u8> = validation.results.iter().filter_map(|r| r.score).collect();
    let average = if scores.is_empty() {
        "n/a".to_string()
    } else {
        let total: u32 = scores.iter().map(|&s| u32::from(s)).sum();
        format!("{:.1}/10", total as f64 / scores.len() as f64)
    };
    let critical = validation.results.iter().filter(|r| r.is_critical()).count();

    out.push_str("---\n### Summary\n");
    let _ = writeln!(out, "- **Average Score:** {average}");
    let _ = writeln!(out, "- **Stories Validated:** {}", validation.results.len());
    let _ = writeln!(out, "- **Critical Issues:** {critical}");
    out
}

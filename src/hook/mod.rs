// ABOUTME: Commit-message hook — requires an issue ID and checks the staged diff against its story.
// ABOUTME: Blocks on low alignment or critical findings; anything it cannot check passes with a warning.

pub mod install;

use crate::config::Switches;
use crate::oracle::IntentValidator;
use crate::tracker::{IssueTracker, check_commit_message};

pub use install::{InstallReport, install_commit_msg_hook};

/// What the hook decided about a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    Pass(String),
    /// Allowed, but some check could not run.
    Warn(String),
    Block(String),
}

impl HookVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, HookVerdict::Block(_))
    }

    pub fn message(&self) -> &str {
        match self {
            HookVerdict::Pass(m) | HookVerdict::Warn(m) | HookVerdict::Block(m) => m,
        }
    }
}

/// Collaborators and thresholds for one hook run.
pub struct HookContext<'a> {
    pub switches: Switches,
    pub min_alignment_score: u8,
    pub scan_security: bool,
    pub tracker: Option<&'a dyn IssueTracker>,
    pub validator: Option<&'a IntentValidator>,
}

/// Drop the comment lines git puts in the message template.
pub fn strip_comments(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Decide whether a commit with `message` and staged `diff` may proceed.
pub async fn check_message(message: &str, diff: &str, ctx: &HookContext<'_>) -> HookVerdict {
    if ctx.switches.skip_validation {
        return HookVerdict::Pass("validation skipped".to_string());
    }

    let issue_id = match check_commit_message(message) {
        Ok(id) => id,
        Err(e) => return HookVerdict::Block(e.to_string()),
    };

    if !ctx.switches.ai_enabled {
        return HookVerdict::Pass(format!("{issue_id} found; AI validation disabled"));
    }
    if diff.trim().is_empty() {
        return HookVerdict::Pass(format!("{issue_id} found; no staged changes to validate"));
    }

    let Some(tracker) = ctx.tracker else {
        return HookVerdict::Warn(format!("{issue_id} found; issue tracker not configured"));
    };
    let issue = match tracker.fetch_issue(&issue_id).await {
        Ok(issue) => issue,
        Err(e) => {
            tracing::warn!(issue = %issue_id, error = %e, "could not fetch story");
            return HookVerdict::Warn(format!("could not fetch {issue_id}: {e}"));
        }
    };

    let Some(validator) = ctx.validator else {
        return HookVerdict::Warn(format!("{issue_id} found; AI validator not configured"));
    };

    let alignment = validator
        .score_alignment(&issue.validation_text(), diff)
        .await;
    let verdict = match alignment.score() {
        Some(score) if score < ctx.min_alignment_score => {
            let mut reason = format!(
                "changes do not match {issue_id} ({}): alignment {score}/10, minimum {}",
                issue.summary, ctx.min_alignment_score
            );
            if let Some(report) = alignment.ok() {
                for discrepancy in report.discrepancies.iter().take(3) {
                    reason.push_str(&format!("\n  - {discrepancy}"));
                }
            }
            return HookVerdict::Block(reason);
        }
        Some(score) => HookVerdict::Pass(format!("{issue_id} alignment {score}/10")),
        None => HookVerdict::Warn(format!(
            "{issue_id} alignment unknown: {}",
            alignment.error().unwrap_or_default()
        )),
    };

    if ctx.scan_security {
        let scan = validator.scan_vulnerabilities(diff).await;
        let severity = scan.severity();
        if severity.is_blocking() {
            let mut reason = format!("critical security findings in {issue_id}");
            if let Some(report) = scan.ok() {
                for finding in &report.findings {
                    reason.push_str(&format!("\n  - [{}] {}", finding.severity, finding.description));
                }
            }
            return HookVerdict::Block(reason);
        }
    }

    verdict
}

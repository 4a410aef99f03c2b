// ABOUTME: Intent validator — scores diffs against intents and scans diffs for vulnerabilities.
// ABOUTME: Every failure comes back as a tagged OracleOutcome; nothing escapes as an error.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::prompt::{ALIGNMENT_SYSTEM, SECURITY_SYSTEM, alignment_prompt, security_prompt};
use super::provider::{Oracle, OracleRequest};
use super::types::{AlignmentReport, OracleOutcome, VulnerabilityReport};
use crate::session::HistoryHint;

/// Asks an oracle to judge diffs. Holds no session state.
pub struct IntentValidator {
    oracle: Arc<dyn Oracle>,
    history: Vec<HistoryHint>,
}

impl IntentValidator {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            history: Vec::new(),
        }
    }

    /// Past-session scores to include for calibration, most recent first.
    pub fn with_history(mut self, history: Vec<HistoryHint>) -> Self {
        self.history = history;
        self
    }

    /// Score how well `diff` implements `intent`.
    pub async fn score_alignment(&self, intent: &str, diff: &str) -> OracleOutcome<AlignmentReport> {
        let request = OracleRequest {
            system: ALIGNMENT_SYSTEM.to_string(),
            prompt: alignment_prompt(intent, diff, &self.history),
            temperature: 0.3,
            max_tokens: 1500,
        };
        let outcome = self.ask(&request, validate_alignment).await;
        if let Some(err) = outcome.error() {
            tracing::warn!(error = %err, "alignment scoring failed");
        }
        outcome
    }

    /// Scan `diff` for security problems.
    pub async fn scan_vulnerabilities(&self, diff: &str) -> OracleOutcome<VulnerabilityReport> {
        let request = OracleRequest {
            system: SECURITY_SYSTEM.to_string(),
            prompt: security_prompt(diff),
            // Lower temperature for more conservative security analysis.
            temperature: 0.1,
            max_tokens: 2000,
        };
        let outcome = self.ask(&request, |_| Ok(())).await;
        if let Some(err) = outcome.error() {
            tracing::warn!(error = %err, "vulnerability scan failed");
        }
        outcome
    }

    async fn ask<T, F>(&self, request: &OracleRequest, check: F) -> OracleOutcome<T>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Result<(), String>,
    {
        match self.oracle.complete(request).await {
            Ok(raw) => parse_reply(&raw, check),
            Err(e) => OracleOutcome::TransportError {
                cause: e.to_string(),
            },
        }
    }
}

/// Parse an oracle reply, tolerating a surrounding markdown code fence.
pub fn parse_reply<T, F>(raw: &str, check: F) -> OracleOutcome<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let body = strip_code_fence(raw);
    let parsed = serde_json::from_str::<T>(body)
        .map_err(|e| e.to_string())
        .and_then(|value| check(&value).map(|()| value));
    match parsed {
        Ok(value) => OracleOutcome::Ok(value),
        Err(message) => OracleOutcome::ParseError {
            raw: raw.to_string(),
            message,
        },
    }
}

fn validate_alignment(report: &AlignmentReport) -> Result<(), String> {
    if report.score > 10 {
        return Err(format!("score {} is outside 0-10", report.score));
    }
    if report.confidence > 100 {
        return Err(format!("confidence {} is outside 0-100", report.confidence));
    }
    Ok(())
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Alignment, OracleError, Severity};
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        Unreachable,
    }

    struct ScriptedOracle {
        reply: Reply,
        seen: Mutex<Vec<OracleRequest>>,
    }

    impl ScriptedOracle {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Unreachable => Err(OracleError::EmptyReply),
            }
        }
    }

    const ALIGNED: &str = r#"{
        "score": 9,
        "confidence": 85,
        "alignment": "aligned",
        "key_functionality_present": true,
        "matches": ["regex validator added"],
        "discrepancies": [],
        "suggestions": []
    }"#;

    #[tokio::test]
    async fn parses_well_formed_alignment() {
        let oracle = ScriptedOracle::new(Reply::Text(ALIGNED));
        let validator = IntentValidator::new(oracle.clone());
        let outcome = validator.score_alignment("Add email validation", "+re.compile").await;

        assert_eq!(outcome.score(), Some(9));
        let report = outcome.ok().unwrap();
        assert_eq!(report.alignment, Alignment::Aligned);
        assert_eq!(report.matches, vec!["regex validator added"]);

        let seen = oracle.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 1500);
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error_with_no_score() {
        let oracle = ScriptedOracle::new(Reply::Text("I think it is fine"));
        let validator = IntentValidator::new(oracle);
        let outcome = validator.score_alignment("Add OAuth2 login", "+x").await;

        assert_eq!(outcome.score(), None);
        assert!(!outcome.error().unwrap().is_empty());
        match outcome {
            OracleOutcome::ParseError { raw, .. } => assert_eq!(raw, "I think it is fine"),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected() {
        let oracle = ScriptedOracle::new(Reply::Text(
            r#"{"score": 42, "confidence": 50, "alignment": "aligned"}"#,
        ));
        let validator = IntentValidator::new(oracle);
        let outcome = validator.score_alignment("intent", "+x").await;
        assert_eq!(outcome.score(), None);
        assert!(outcome.error().unwrap().contains("outside 0-10"));
    }

    #[tokio::test]
    async fn missing_required_key_is_a_parse_error() {
        let oracle = ScriptedOracle::new(Reply::Text(r#"{"score": 4, "confidence": 50}"#));
        let validator = IntentValidator::new(oracle);
        let outcome = validator.score_alignment("intent", "+x").await;
        assert!(matches!(outcome, OracleOutcome::ParseError { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_tagged() {
        let oracle = ScriptedOracle::new(Reply::Unreachable);
        let validator = IntentValidator::new(oracle);
        let outcome = validator.score_alignment("intent", "+x").await;
        assert!(matches!(outcome, OracleOutcome::TransportError { .. }));
        assert_eq!(outcome.score(), None);
    }

    #[tokio::test]
    async fn history_reaches_the_prompt() {
        let oracle = ScriptedOracle::new(Reply::Text(ALIGNED));
        let validator = IntentValidator::new(oracle.clone()).with_history(vec![HistoryHint {
            intent: "Add email validation".to_string(),
            score: Some(8),
            commits: 3,
        }]);
        validator.score_alignment("Add phone validation", "+x").await;
        let seen = oracle.seen.lock().unwrap();
        assert!(seen[0].prompt.contains("'Add email validation' achieved alignment score 8/10"));
    }

    #[tokio::test]
    async fn scan_parses_findings() {
        let oracle = ScriptedOracle::new(Reply::Text(
            r#"```json
{
  "overall_severity": "CRITICAL",
  "confidence": 95,
  "vulnerabilities": [
    {"type": "secrets", "severity": "CRITICAL", "description": "AWS key committed", "location": "settings.py:12", "fix": "move to env"}
  ],
  "requires_immediate_action": true
}
```"#,
        ));
        let validator = IntentValidator::new(oracle.clone());
        let outcome = validator.scan_vulnerabilities("+AWS_KEY = 'AKIA...'").await;

        assert_eq!(outcome.severity(), Severity::Critical);
        let report = outcome.ok().unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, "secrets");
        assert!(report.requires_immediate_action);
        assert_eq!(oracle.seen.lock().unwrap()[0].max_tokens, 2000);
    }

    #[tokio::test]
    async fn failed_scan_reports_unknown_severity() {
        let oracle = ScriptedOracle::new(Reply::Unreachable);
        let validator = IntentValidator::new(oracle);
        let outcome = validator.scan_vulnerabilities("+x").await;
        assert_eq!(outcome.severity(), Severity::Unknown);
        assert!(outcome.error().is_some());
    }

    #[tokio::test]
    async fn clean_scan_reports_none() {
        let oracle = ScriptedOracle::new(Reply::Text(
            r#"{"overall_severity": "NONE", "confidence": 90, "vulnerabilities": []}"#,
        ));
        let validator = IntentValidator::new(oracle);
        let outcome = validator.scan_vulnerabilities("+x").await;
        assert_eq!(outcome.severity(), Severity::None);
        assert!(outcome.error().is_none());
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
    }
}

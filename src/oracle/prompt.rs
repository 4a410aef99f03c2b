// ABOUTME: Prompt construction for the oracle — alignment scoring and security scanning.
// ABOUTME: Detects the diff's language to pick a security checklist and embeds history hints.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::session::HistoryHint;

pub const ALIGNMENT_SYSTEM: &str =
    "You are an expert code reviewer. Always respond with valid JSON.";
pub const SECURITY_SYSTEM: &str =
    "You are a cybersecurity expert. Always respond with valid JSON.";

const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Ordered detection table; the first pattern that matches wins.
static LANGUAGE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Python", r"\+.*\.(py)[\s:]|import |def |class "),
        ("JavaScript", r"\+.*\.(js|jsx)[\s:]|const |let |function |=>"),
        ("TypeScript", r"\+.*\.(ts|tsx)[\s:]|interface |type |const.*:"),
        ("Java", r"\+.*\.java[\s:]|public class |private |@Override"),
        ("Go", r"\+.*\.go[\s:]|func |package |import "),
        ("Rust", r"\+.*\.rs[\s:]|fn |impl |pub "),
        ("C++", r"\+.*\.(cpp|hpp)[\s:]|#include |namespace |std::"),
        ("Ruby", r"\+.*\.rb[\s:]|def |class |end$"),
        ("PHP", r"\+.*\.php[\s:]|<\?php|function |class "),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        let regex = Regex::new(&format!("(?m){pattern}")).expect("language pattern compiles");
        (name, regex)
    })
    .collect()
});

/// Best guess at the primary language of a diff.
pub fn detect_language(diff: &str) -> &'static str {
    LANGUAGE_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(diff))
        .map(|(name, _)| *name)
        .unwrap_or(UNKNOWN_LANGUAGE)
}

/// Security checklist for a language.
pub fn language_checklist(language: &str) -> &'static str {
    match language {
        "Python" => {
            "Check for: SQL injection in raw queries, unsafe pickle usage, command injection via os.system, eval/exec usage."
        }
        "JavaScript" => {
            "Check for: XSS vulnerabilities, prototype pollution, unsafe innerHTML, eval usage, missing input sanitization."
        }
        "TypeScript" => {
            "Check for: type casting bypasses, 'any' overuse, missing null checks, unsafe type assertions."
        }
        "Java" => {
            "Check for: SQL injection, XML injection, deserialization vulnerabilities, path traversal."
        }
        "Go" => "Check for: SQL injection, command injection, race conditions, ignored errors.",
        "PHP" => {
            "Check for: SQL injection, XSS, file inclusion vulnerabilities, command injection."
        }
        _ => "Check for: common security vulnerabilities and code quality issues.",
    }
}

fn history_section(history: &[HistoryHint]) -> String {
    let scored: Vec<&HistoryHint> = history.iter().filter(|h| h.score.is_some()).collect();
    if scored.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nHistorical context (past sessions, most recent first):\n");
    for hint in scored {
        if let Some(score) = hint.score {
            let _ = writeln!(
                out,
                "- Past intent: '{}' achieved alignment score {}/10 over {} commit(s)",
                hint.intent, score, hint.commits
            );
        }
    }
    out
}

/// Prompt asking the oracle to score how well `diff` implements `intent`.
pub fn alignment_prompt(intent: &str, diff: &str, history: &[HistoryHint]) -> String {
    let language = detect_language(diff);
    let history = history_section(history);
    format!(
        r#"You are reviewing whether a code change implements the developer's stated intent. Be strict.

Scoring rubric:
- 0-2: the key functionality named in the intent is absent from the diff
- 3-4: the diff barely relates to the intent
- 5-6: partial implementation, or significant unrelated changes
- 7-8: good implementation with minor gaps or scope drift
- 9-10: the diff fully implements the intent and nothing else

Reading the diff: lines starting with '+' were added, lines starting with '-' were removed,
other lines are unchanged context. If the intent says "add X" and X is not added, the score
must be 0-2 regardless of how much else changed.

Language detected: {language}
Developer's stated intent: "{intent}"{history}

Diff:
{diff}

Respond with a single JSON object and nothing else:
{{
  "score": <integer 0-10>,
  "confidence": <integer 0-100>,
  "alignment": "<aligned|partially_aligned|misaligned>",
  "intent_summary": "<the key functionality the developer meant to add>",
  "actual_changes": "<what the diff actually does>",
  "key_functionality_present": <true|false>,
  "matches": ["<what aligns>"],
  "discrepancies": ["<what is missing or out of scope>"],
  "suggestions": ["<how to close the gap>"],
  "risk_level": "<low|medium|high>",
  "needs_human_review": <true|false>
}}
"#
    )
}

/// Prompt asking the oracle to scan `diff` for vulnerabilities.
pub fn security_prompt(diff: &str) -> String {
    let language = detect_language(diff);
    let checklist = language_checklist(language);
    format!(
        r#"You are auditing a code change for security vulnerabilities.

Language: {language}
Language-specific checklist: {checklist}

Focus on added lines (prefixed with '+'); removed lines matter only if they drop a protection.

Cover: authentication and authorization gaps, input validation (SQL/command/path injection,
XSS), hardcoded secrets or sensitive data in logs, dangerous functions, race conditions,
resource exhaustion, and insecure configuration or dependencies.

Diff:
{diff}

Respond with a single JSON object and nothing else:
{{
  "overall_severity": "<NONE|LOW|MEDIUM|HIGH|CRITICAL>",
  "confidence": <integer 0-100>,
  "vulnerabilities": [
    {{
      "type": "<sql_injection|xss|auth|secrets|...>",
      "severity": "<LOW|MEDIUM|HIGH|CRITICAL>",
      "description": "<what is wrong>",
      "location": "<file, line, or context>",
      "fix": "<how to remediate>"
    }}
  ],
  "safe_practices_found": ["<good practices in the diff>"],
  "recommendations": ["<prioritized recommendations>"],
  "requires_immediate_action": <true|false>
}}
"#
    )
}

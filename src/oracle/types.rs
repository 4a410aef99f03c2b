// ABOUTME: Core types for oracle replies — alignment reports, vulnerability reports, severities.
// ABOUTME: OracleOutcome tags every reply as Ok, ParseError, or TransportError.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How well a diff matches the stated intent, as categorized by the oracle.
///
/// The category is advisory; the score carries the decision. A category the
/// oracle invents maps to `Unknown` rather than rejecting the whole reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Aligned,
    #[serde(alias = "partial")]
    PartiallyAligned,
    Misaligned,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Alignment::Aligned => "aligned",
            Alignment::PartiallyAligned => "partially_aligned",
            Alignment::Misaligned => "misaligned",
            Alignment::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Severity of a security finding.
///
/// `Unknown` is reserved for scans that did not produce a usable reply, so
/// that "nothing found" (`None`) is never confused with "could not check".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Unknown,
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Only a critical finding stops a commit.
    pub fn is_blocking(&self) -> bool {
        *self == Severity::Critical
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Severity::Unknown),
            "NONE" => Ok(Severity::None),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: '{other}'")),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

/// Structured verdict on whether a diff implements the stated intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// 0–10.
    pub score: u8,
    /// 0–100.
    pub confidence: u8,
    pub alignment: Alignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_changes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_functionality_present: Option<bool>,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub discrepancies: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_human_review: Option<bool>,
}

/// A single vulnerability reported by a security scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// Result of scanning a diff for security problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    #[serde(rename = "overall_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default, rename = "vulnerabilities")]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub safe_practices_found: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub requires_immediate_action: bool,
}

/// A reply from the oracle, tagged by how far it got.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome<T> {
    /// The reply parsed into the expected shape.
    Ok(T),
    /// The oracle answered, but the answer was not the expected JSON.
    ParseError { raw: String, message: String },
    /// The request never produced an answer.
    TransportError { cause: String },
}

impl<T> OracleOutcome<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            OracleOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_ok(self) -> Option<T> {
        match self {
            OracleOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, OracleOutcome::Ok(_))
    }

    /// Human-readable reason for a failed reply; `None` on success.
    pub fn error(&self) -> Option<String> {
        match self {
            OracleOutcome::Ok(_) => None,
            OracleOutcome::ParseError { message, .. } => {
                Some(format!("JSON parsing error: {message}"))
            }
            OracleOutcome::TransportError { cause } => Some(format!("oracle unreachable: {cause}")),
        }
    }
}

impl OracleOutcome<AlignmentReport> {
    /// The alignment score, or `None` when it is unknown. Unknown is not zero.
    pub fn score(&self) -> Option<u8> {
        self.ok().map(|r| r.score)
    }
}

impl OracleOutcome<VulnerabilityReport> {
    /// Overall severity; `Unknown` whenever the scan failed.
    pub fn severity(&self) -> Severity {
        self.ok().map(|r| r.severity).unwrap_or(Severity::Unknown)
    }
}

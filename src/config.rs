// ABOUTME: Configuration loading for intent-tracker.
// ABOUTME: Reads ~/.intent-tracker/config.toml and the validation switches from the environment.

use std::path::PathBuf;

use serde::Deserialize;

/// Environment variable that bypasses every check when truthy.
pub const SKIP_VALIDATION_ENV: &str = "SKIP_INTENT_VALIDATION";
/// Environment variable that turns off the oracle (issue IDs are still required).
pub const ENABLE_AI_ENV: &str = "ENABLE_AI_VALIDATION";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub jira: JiraConfig,
    pub validation: ValidationConfig,
}

/// Oracle provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_seconds: 30,
        }
    }
}

/// Non-secret Jira settings. The API token only ever comes from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub email: Option<String>,
}

/// Knobs for how validation results are used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// How many closed sessions to show the oracle for calibration.
    pub history_limit: usize,
    /// Known scores below this block the commit-msg hook.
    pub min_alignment_score: u8,
    /// Whether the commit-msg hook also runs a security scan.
    pub scan_security: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            history_limit: 3,
            min_alignment_score: 3,
            scan_security: false,
        }
    }
}

impl Config {
    /// Load config from ~/.intent-tracker/config.toml, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".intent-tracker")
    }

    /// Path to the config file.
    pub fn config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// Path to a user-wide .env holding API keys.
    pub fn secrets_env_path() -> PathBuf {
        Self::base_dir().join(".env")
    }
}

/// The two environment switches that shortcut validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switches {
    pub skip_validation: bool,
    pub ai_enabled: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            skip_validation: false,
            ai_enabled: true,
        }
    }
}

impl Switches {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build switches from any key lookup, so callers need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let skip_validation = lookup(SKIP_VALIDATION_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        let ai_enabled = lookup(ENABLE_AI_ENV)
            .map(|v| !is_falsy(&v))
            .unwrap_or(true);
        Self {
            skip_validation,
            ai_enabled,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_seconds, 30);
        assert_eq!(config.validation.history_limit, 3);
        assert_eq!(config.validation.min_alignment_score, 3);
        assert!(config.jira.url.is_none());
    }

    #[test]
    fn parse_config_toml() {
        let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3"
base_url = "http://localhost:11434"
timeout_seconds = 10

[jira]
url = "https://example.atlassian.net"
email = "dev@example.com"

[validation]
history_limit = 5
min_alignment_score = 6
scan_security = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.llm.timeout_seconds, 10);
        assert_eq!(config.jira.email.as_deref(), Some("dev@example.com"));
        assert_eq!(config.validation.history_limit, 5);
        assert_eq!(config.validation.min_alignment_score, 6);
        assert!(config.validation.scan_security);
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[llm]\nmodel = \"gpt-4o\"\n").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.validation.min_alignment_score, 3);
    }

    fn switches(pairs: &[(&str, &str)]) -> Switches {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Switches::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn switches_default_to_validating_with_ai() {
        assert_eq!(switches(&[]), Switches::default());
    }

    #[test]
    fn skip_switch_accepts_common_truthy_values() {
        assert!(switches(&[(SKIP_VALIDATION_ENV, "1")]).skip_validation);
        assert!(switches(&[(SKIP_VALIDATION_ENV, "TRUE")]).skip_validation);
        assert!(!switches(&[(SKIP_VALIDATION_ENV, "0")]).skip_validation);
    }

    #[test]
    fn ai_switch_only_disabled_by_falsy_values() {
        assert!(!switches(&[(ENABLE_AI_ENV, "false")]).ai_enabled);
        assert!(!switches(&[(ENABLE_AI_ENV, "off")]).ai_enabled);
        assert!(switches(&[(ENABLE_AI_ENV, "whatever")]).ai_enabled);
    }
}

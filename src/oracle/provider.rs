// ABOUTME: Oracle transport — the Oracle trait and the HTTP chat-completions client behind it.
// ABOUTME: Provider factory picks openai or ollama from config; every client has a timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Errors raised while reaching the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("{0} not found. Set it in your environment or .env file")]
    MissingCredentials(&'static str),
    #[error("unknown LLM provider: '{0}'. Expected: openai, ollama")]
    UnknownProvider(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("provider reply had no message content")]
    EmptyReply,
}

/// One scoring request: a system instruction and a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A black box that answers a prompt with (hopefully) JSON text.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Chat-completions client for OpenAI and OpenAI-compatible endpoints.
pub struct ChatCompletionsOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionsOracle {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl Oracle for ChatCompletionsOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %self.model, endpoint = %self.endpoint(), "sending oracle request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        extract_content(parsed)
    }
}

fn extract_content(response: ChatResponse) -> Result<String, OracleError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(OracleError::EmptyReply)
}

/// Create an oracle client based on the provider name in config.
pub fn create_oracle(config: &LlmConfig) -> Result<Arc<dyn Oracle>, OracleError> {
    create_oracle_with(config, |key| std::env::var(key).ok())
}

/// Like [`create_oracle`], reading credentials through `lookup`.
pub fn create_oracle_with(
    config: &LlmConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn Oracle>, OracleError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let base_url = config.base_url.as_deref().filter(|s| !s.is_empty());
    match config.provider.as_str() {
        "openai" => {
            let api_key = lookup("OPENAI_API_KEY")
                .filter(|k| !k.is_empty())
                .ok_or(OracleError::MissingCredentials("OPENAI_API_KEY"))?;
            let client = ChatCompletionsOracle::new(
                base_url.unwrap_or(OPENAI_BASE_URL),
                Some(api_key),
                &config.model,
                timeout,
            )?;
            Ok(Arc::new(client))
        }
        "ollama" => {
            let base_url = format!(
                "{}/v1",
                base_url.unwrap_or(OLLAMA_BASE_URL).trim_end_matches('/')
            );
            let client = ChatCompletionsOracle::new(base_url, None, &config.model, timeout)?;
            Ok(Arc::new(client))
        }
        other => Err(OracleError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_errors() {
        let config = LlmConfig {
            provider: "fakeprovider".to_string(),
            ..Default::default()
        };
        let err = create_oracle_with(&config, |_| None).err().unwrap();
        assert!(err.to_string().contains("fakeprovider"));
    }

    #[test]
    fn openai_without_key_is_a_configuration_error() {
        let config = LlmConfig::default();
        let err = create_oracle_with(&config, |_| None).err().unwrap();
        assert!(matches!(err, OracleError::MissingCredentials("OPENAI_API_KEY")));
    }

    #[test]
    fn openai_with_key_builds() {
        let config = LlmConfig::default();
        let result = create_oracle_with(&config, |key| {
            (key == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            ..Default::default()
        };
        assert!(create_oracle_with(&config, |_| None).is_ok());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let oracle = ChatCompletionsOracle::new(
            "http://localhost:11434/v1/",
            None,
            "llama3",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn extract_content_takes_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"score\":5}"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "{\"score\":5}");
    }

    #[test]
    fn extract_content_rejects_empty_reply() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_content(response), Err(OracleError::EmptyReply)));
    }
}

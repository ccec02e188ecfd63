//! Hosted text generation over the Anthropic Messages API.
//!
//! One blocking request per call: a single user message, a fixed model and an
//! output-length cap. No streaming, retries or timeouts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use reviewrag_core::config::LlmSettings;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not found. Set {env_var} or enter a key")]
    MissingApiKey { env_var: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Anything that turns a filled prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl AnthropicClient {
    /// `api_key` wins over the configured environment variable.
    pub fn new(settings: &LlmSettings, api_key: Option<String>) -> Result<Self, LlmError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| settings.api_key_from_env())
            .ok_or_else(|| LlmError::MissingApiKey { env_var: settings.api_key_env.clone() })?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_key,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![AnthropicMessage { role: "user", content: prompt }],
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.endpoint);
        tracing::info!(model = %self.model, prompt_chars = prompt.len(), "calling generation endpoint");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LlmError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Api { status: status.as_u16(), message: error_message(&body) });
        }
        first_text_block(&body)
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<AnthropicErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn first_text_block(body: &str) -> Result<String, LlmError> {
    let parsed: AnthropicResponse = serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    parsed
        .content
        .into_iter()
        .find(|b| b.kind == "text" || b.kind.is_empty())
        .and_then(|b| b.text)
        .ok_or_else(|| LlmError::Parse("No response content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LlmSettings {
        LlmSettings { api_key_env: "REVIEWRAG_TEST_UNSET_KEY".into(), ..Default::default() }
    }

    #[test]
    fn explicit_key_is_required_when_env_is_unset() {
        let err = AnthropicClient::new(&settings(), None).err().expect("missing key");
        assert!(err.to_string().contains("REVIEWRAG_TEST_UNSET_KEY"));
        assert!(AnthropicClient::new(&settings(), Some("  ".into())).is_err());
    }

    #[test]
    fn request_is_single_user_message() {
        let client = AnthropicClient::new(&settings(), Some("sk-test".into())).expect("client");
        let json = serde_json::to_value(client.request_body("hello")).expect("json");
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn parses_first_text_block() {
        let body = r#"{"id":"msg_1","content":[{"type":"text","text":"Users dislike the paywall."}],"stop_reason":"end_turn"}"#;
        assert_eq!(first_text_block(body).expect("text"), "Users dislike the paywall.");
        assert!(matches!(first_text_block(r#"{"content":[]}"#), Err(LlmError::Parse(_))));
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(error_message(body), "invalid x-api-key");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}

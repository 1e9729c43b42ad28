//! OpenAI-compatible LLM Provider
//!
//! Talks to any `/chat/completions` endpoint (OpenAI, Azure OpenAI behind a
//! compatible gateway, vLLM, ...). The API key is read once from the
//! environment variable named in `llm.openai.api_key_env`.

use super::{LLMError, LLMProvider, Message};
use crate::config::{secret_from_env, OpenAIConfig};
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde_json::json;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the provider from config, reading the key from the environment
    pub fn from_env(config: OpenAIConfig) -> Result<Self, EngineError> {
        let api_key = secret_from_env(&config.api_key_env)?;
        Ok(Self::new(config, api_key))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(text));
            }
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        data.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LLMError::ParseError("No message content in response".to_string()))
    }
}

//! Ollama provider
//!
//! Non-streaming `POST {base_url}/api/chat`. The engine paces answer tokens
//! itself, so one complete reply per call is all it needs.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{LLMError, LLMProvider, Message, Result};

/// Local model served by an Ollama daemon
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    /// Deadlines belong to the caller, so the client carries no timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: Client::new(),
        }
    }

    fn send_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout
        } else if e.is_connect() {
            LLMError::ProviderUnavailable(format!("no Ollama daemon at {}", self.base_url))
        } else {
            LLMError::NetworkError(e.to_string())
        }
    }

    fn status_error(&self, status: StatusCode, body: &str) -> LLMError {
        let detail = serde_json::from_str::<ChatError>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.to_string());
        match status {
            StatusCode::NOT_FOUND => LLMError::InvalidRequest(format!(
                "model '{}' is not pulled: {}",
                self.model, detail
            )),
            StatusCode::BAD_REQUEST => LLMError::InvalidRequest(detail),
            _ => LLMError::ProviderUnavailable(format!("Ollama returned {}: {}", status, detail)),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatError {
    error: String,
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        tracing::debug!(model = %self.model, messages = messages.len(), prompt_chars, "Ollama chat");

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, &body));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Ollama reply: {}", e)))?;
        if reply.message.content.trim().is_empty() {
            return Err(LLMError::ParseError("Ollama returned an empty reply".to_string()));
        }
        Ok(reply.message.content)
    }
}

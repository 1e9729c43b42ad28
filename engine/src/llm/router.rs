//! LLM Router
//!
//! Orders the configured providers (the configured default first, then
//! local before cloud) and calls them with automatic failover. Each attempt
//! runs under its own timeout so one hung provider cannot consume the whole
//! budget of the caller.

use super::{LLMError, LLMProvider, Message};
use crate::config::LLMConfig;
use std::sync::Arc;
use std::time::Duration;

/// Per-attempt timeout for local providers (model load + generation)
const LOCAL_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-attempt timeout for cloud providers
const CLOUD_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// LLM Router that selects providers in preference order
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// LLM configuration
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    /// Create a new LLM router
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Rank providers: configured default first, then local, then cloud.
    /// The sort is stable so registration order breaks ties.
    pub fn rank_providers(&self) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        let default_provider = &self.config.default_provider;
        providers.sort_by_key(|p| {
            let is_default = p.name() == default_provider;
            (!is_default, !p.is_local())
        });

        providers
    }

    /// Call LLM providers with automatic failover
    ///
    /// Returns the generated text and the name of the provider that produced it.
    pub async fn call(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        for provider in self.rank_providers() {
            let attempt_timeout = if provider.is_local() {
                LOCAL_ATTEMPT_TIMEOUT
            } else {
                CLOUD_ATTEMPT_TIMEOUT
            };
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                attempt_timeout.as_secs()
            );

            match tokio::time::timeout(attempt_timeout, provider.generate(messages)).await {
                Ok(Ok(text)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok((text, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        attempt_timeout.as_secs()
                    );
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(LLMError::ProviderUnavailable(
            "All LLM providers failed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // Mock provider for testing
    struct MockProvider {
        name: String,
        is_local: bool,
        reply: Option<String>,
    }

    impl MockProvider {
        fn new(name: &str, is_local: bool, reply: Option<&str>) -> Self {
            Self {
                name: name.to_string(),
                is_local,
                reply: reply.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        async fn generate(&self, _messages: &[Message]) -> crate::llm::Result<String> {
            self.reply
                .clone()
                .ok_or_else(|| LLMError::NetworkError("mock failure".to_string()))
        }
    }

    fn config(default_provider: &str) -> Arc<LLMConfig> {
        Arc::new(LLMConfig {
            default_provider: default_provider.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_provider_ranked_first() {
        let router = LLMRouter::new(
            vec![
                Box::new(MockProvider::new("ollama", true, Some("a"))),
                Box::new(MockProvider::new("openai", false, Some("b"))),
            ],
            config("openai"),
        );

        let ranked: Vec<&str> = router.rank_providers().iter().map(|p| p.name()).collect();
        assert_eq!(ranked, vec!["openai", "ollama"]);
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let router = LLMRouter::new(
            vec![
                Box::new(MockProvider::new("ollama", true, None)),
                Box::new(MockProvider::new("openai", false, Some("fallback answer"))),
            ],
            config("ollama"),
        );

        let (text, provider) = router.call(&[Message::user("hi")]).await.unwrap();
        assert_eq!(text, "fallback answer");
        assert_eq!(provider, "openai");
    }

    #[tokio::test]
    async fn test_no_providers() {
        let router = LLMRouter::new(vec![], config("ollama"));
        assert!(router.is_empty());
        let result = router.call(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LLMError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let router = LLMRouter::new(
            vec![Box::new(MockProvider::new("ollama", true, None))],
            config("ollama"),
        );
        assert!(router.call(&[Message::user("hi")]).await.is_err());
    }
}

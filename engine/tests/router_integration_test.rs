//! Integration tests for the LLM Router
//!
//! Validates provider failover using mock servers

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use fundrag_engine::config::{LLMConfig, OpenAIConfig};
use fundrag_engine::llm::{
    ollama::OllamaProvider, openai::OpenAIProvider, router::LLMRouter, LLMProvider, Message,
};

#[tokio::test]
async fn test_llm_router_failover_with_wiremock() {
    let failing_server = MockServer::start().await;
    let succeeding_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello from the fallback."}}]
        })))
        .mount(&succeeding_server)
        .await;

    // The local default is tried first, the cloud provider second
    let ollama = Box::new(OllamaProvider::new(failing_server.uri(), "llama3.1:8b"))
        as Box<dyn LLMProvider>;
    let openai = Box::new(OpenAIProvider::new(
        OpenAIConfig {
            base_url: succeeding_server.uri(),
            ..openai_defaults()
        },
        "test-key",
    )) as Box<dyn LLMProvider>;

    let router = LLMRouter::new(vec![openai, ollama], Arc::new(LLMConfig::default()));
    assert_eq!(router.rank_providers()[0].name(), "ollama");

    let (text, provider) = router.call(&[Message::user("Hello")]).await.unwrap();
    assert_eq!(text, "Hello from the fallback.");
    assert_eq!(provider, "openai");
}

#[tokio::test]
async fn test_llm_router_all_providers_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let router = LLMRouter::new(
        vec![Box::new(OllamaProvider::new(server.uri(), "llama3.1:8b"))],
        Arc::new(LLMConfig::default()),
    );
    assert!(router.call(&[Message::user("Hello")]).await.is_err());
}

fn openai_defaults() -> OpenAIConfig {
    fundrag_engine::config::Config::default().llm.openai
}

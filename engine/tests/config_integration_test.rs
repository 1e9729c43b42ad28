//! Integration tests for configuration loading from disk

use fundrag_engine::config::Config;
use std::io::Write;

#[test]
fn test_config_toml_parsing() {
    let toml_content = r#"
[core]
log_level = "debug"

[llm]
default_provider = "openai"

[llm.openai]
base_url = "https://gateway.example.com/v1"
model = "gpt-4o-mini"
api_key_env = "GATEWAY_KEY"

[search]
endpoint = "https://funds.search.windows.net"
fund_index = "nport-funds-index"
macro_index = "imf_raptor"
semantic_top_k = 8

[database]
url = "sqlite://nport_funds.db?mode=ro"
max_rows = 25

[timeouts]
structured = 4000
semantic = 9000

[classifier]
model_assisted = true

[streaming]
chunk_delay_ms = 0
chunk_words = 4

[pii]
enabled = false

[server]
bind = "0.0.0.0:8080"
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let config = Config::load_from_path(file.path()).unwrap();
    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.llm.openai.api_key_env, "GATEWAY_KEY");
    assert_eq!(config.search.semantic_top_k, 8);
    assert_eq!(config.search.macro_top_k, 3);
    assert_eq!(config.database.max_rows, 25);
    assert_eq!(config.timeouts.structured().as_millis(), 4000);
    assert_eq!(config.timeouts.synthesis().as_millis(), 60_000);
    assert!(config.classifier.model_assisted);
    assert_eq!(config.streaming.chunk_words, 4);
    assert!(!config.pii.enabled);
    assert_eq!(config.server.bind, "0.0.0.0:8080");
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[pii]\nconfidence_threshold = 1.5\n").unwrap();

    let err = Config::load_from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("confidence_threshold"));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load_from_path(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_secrets_never_serialized() {
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    assert!(rendered.contains("api_key_env"));
    assert!(!rendered.contains("api_key ="));
}

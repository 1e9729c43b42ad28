//! Configuration management
//!
//! This module handles loading, validation, and management of the fundrag
//! configuration. Configuration is stored in TOML format at
//! ~/.fundrag/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **llm**: LLM provider settings and preferences
//! - **search**: Search service holding the fund and macro-outlook indexes
//! - **database**: Structured fund corpus
//! - **timeouts**: Per-source and per-synthesis deadlines
//! - **classifier**: Model-assisted routing flag
//! - **merger**: Citation cap
//! - **streaming**: Answer pacing
//! - **pii**: PII screening service
//! - **server**: HTTP bind address
//!
//! Secrets (API keys) are never stored in the file. Sections that need one
//! name the environment variable that holds it.
//!
//! # Examples
//!
//! ```no_run
//! use fundrag_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Default provider: {}", config.llm.default_provider);
//! println!("Max citations: {}", config.merger.max_citations);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Search service configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Structured fund database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Deadlines for external calls
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Route classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Evidence merger settings
    #[serde(default)]
    pub merger: MergerConfig,

    /// Answer streaming settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// PII screening settings
    #[serde(default)]
    pub pii: PiiConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (ollama, openai)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model or deployment name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search service endpoint (e.g. https://<name>.search.windows.net)
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the search API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// REST API version sent with every query
    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    /// Index of fund description documents
    #[serde(default = "default_fund_index")]
    pub fund_index: String,

    /// Index of hierarchical macro-outlook summaries
    #[serde(default = "default_macro_index")]
    pub macro_index: String,

    /// Passages requested from the fund index
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,

    /// Passages requested from the macro-outlook index
    #[serde(default = "default_macro_top_k")]
    pub macro_top_k: usize,

    /// Vector field of the fund index; the index vectorizer embeds the query
    #[serde(default = "default_fund_vector_field")]
    pub fund_vector_field: String,

    /// Vector field of the macro-outlook index
    #[serde(default = "default_macro_vector_field")]
    pub macro_vector_field: String,
}

/// Structured fund database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL of the fund database
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum rows turned into evidence per query
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

/// Per-call deadlines in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_structured_timeout")]
    pub structured: u64,

    #[serde(default = "default_semantic_timeout")]
    pub semantic: u64,

    #[serde(default = "default_macro_timeout")]
    pub macro_outlook: u64,

    #[serde(default = "default_synthesis_timeout")]
    pub synthesis: u64,

    #[serde(default = "default_classifier_timeout")]
    pub classifier: u64,
}

impl TimeoutsConfig {
    pub fn structured(&self) -> Duration {
        Duration::from_millis(self.structured)
    }

    pub fn semantic(&self) -> Duration {
        Duration::from_millis(self.semantic)
    }

    pub fn macro_outlook(&self) -> Duration {
        Duration::from_millis(self.macro_outlook)
    }

    pub fn synthesis(&self) -> Duration {
        Duration::from_millis(self.synthesis)
    }

    pub fn classifier(&self) -> Duration {
        Duration::from_millis(self.classifier)
    }
}

/// Route classifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Ask the LLM to route questions the heuristics cannot place
    #[serde(default)]
    pub model_assisted: bool,
}

/// Evidence merger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergerConfig {
    /// Maximum citations returned per response
    #[serde(default = "default_max_citations")]
    pub max_citations: usize,
}

/// Answer streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Pause between answer chunks in milliseconds
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,

    /// Words per answer chunk (0 disables token events)
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,
}

/// PII screening configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiConfig {
    /// Screen questions before they reach the orchestrator
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Language service endpoint
    #[serde(default = "default_pii_endpoint")]
    pub endpoint: String,

    /// Minimum entity confidence that blocks a question (0.0-1.0)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Screening deadline in milliseconds
    #[serde(default = "default_pii_timeout")]
    pub timeout_ms: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_search_endpoint() -> String {
    "http://localhost:7700".to_string()
}

fn default_search_key_env() -> String {
    "SEARCH_API_KEY".to_string()
}

fn default_search_api_version() -> String {
    "2024-07-01".to_string()
}

fn default_fund_index() -> String {
    "nport-funds-index".to_string()
}

fn default_macro_index() -> String {
    "imf_raptor".to_string()
}

fn default_semantic_top_k() -> usize {
    5
}

fn default_macro_top_k() -> usize {
    3
}

fn default_fund_vector_field() -> String {
    "content_vector".to_string()
}

fn default_macro_vector_field() -> String {
    "contentVector".to_string()
}

fn default_database_url() -> String {
    "sqlite://nport_funds.db?mode=ro".to_string()
}

fn default_max_rows() -> usize {
    10
}

fn default_structured_timeout() -> u64 {
    8_000
}

fn default_semantic_timeout() -> u64 {
    15_000
}

fn default_macro_timeout() -> u64 {
    15_000
}

fn default_synthesis_timeout() -> u64 {
    60_000
}

fn default_classifier_timeout() -> u64 {
    5_000
}

fn default_max_citations() -> usize {
    8
}

fn default_chunk_delay() -> u64 {
    30
}

fn default_chunk_words() -> usize {
    1
}

fn default_pii_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_pii_timeout() -> u64 {
    5_000
}

fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_openai_key_env(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            api_version: default_search_api_version(),
            fund_index: default_fund_index(),
            macro_index: default_macro_index(),
            semantic_top_k: default_semantic_top_k(),
            macro_top_k: default_macro_top_k(),
            fund_vector_field: default_fund_vector_field(),
            macro_vector_field: default_macro_vector_field(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_rows: default_max_rows(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            structured: default_structured_timeout(),
            semantic: default_semantic_timeout(),
            macro_outlook: default_macro_timeout(),
            synthesis: default_synthesis_timeout(),
            classifier: default_classifier_timeout(),
        }
    }
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            max_citations: default_max_citations(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: default_chunk_delay(),
            chunk_words: default_chunk_words(),
        }
    }
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_pii_endpoint(),
            confidence_threshold: default_confidence_threshold(),
            timeout_ms: default_pii_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.fundrag/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();
        config.validate()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.fundrag/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".fundrag").join("config.toml"))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level or default provider is unknown
    /// - A threshold is outside 0.0-1.0
    /// - A timeout, top-k or citation cap is zero
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if !(0.0..=1.0).contains(&self.pii.confidence_threshold) {
            return Err(EngineError::Config(
                "pii.confidence_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.merger.max_citations == 0 {
            return Err(EngineError::Config(
                "merger.max_citations must be at least 1".to_string(),
            ));
        }

        if self.search.semantic_top_k == 0 || self.search.macro_top_k == 0 {
            return Err(EngineError::Config(
                "search top_k values must be at least 1".to_string(),
            ));
        }

        if self.database.max_rows == 0 {
            return Err(EngineError::Config(
                "database.max_rows must be at least 1".to_string(),
            ));
        }

        let t = &self.timeouts;
        let named = [
            ("structured", t.structured),
            ("semantic", t.semantic),
            ("macro_outlook", t.macro_outlook),
            ("synthesis", t.synthesis),
            ("classifier", t.classifier),
            ("pii", self.pii.timeout_ms),
        ];
        if let Some((name, _)) = named.iter().find(|(_, ms)| *ms == 0) {
            return Err(EngineError::Config(format!(
                "timeout '{}' must be greater than zero",
                name
            )));
        }

        Ok(())
    }
}

/// Read a secret from the environment variable a config section names
pub fn secret_from_env(var: &str) -> Result<String, EngineError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EngineError::MissingCredential(var.to_string()))
}

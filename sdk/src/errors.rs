//! Error types and handling
//!
//! This module provides the error type used throughout the fundrag engine
//! for failures outside a single retrieval call: configuration, collaborator
//! credentials, the structured-data store and the transport layer. All errors
//! implement the `ErrorExt` trait which provides user-friendly hints.
//!
//! # Security
//!
//! Error messages never include API keys or raw connection strings.

use thiserror::Error;

/// Trait for engine error extensions
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Network("connection reset".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.user_hint().contains("reset"));
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::MissingCredential(_) => "Export the API key named in config.toml and restart",

            Self::Database(_) => "The fund database could not answer. Check database.url",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }
}

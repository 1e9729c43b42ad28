//! Fundrag SDK
//!
//! Shared types and error handling for the fundrag engine and its callers.

/// Error types and handling
pub mod errors;

/// Question, route and source vocabulary
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{ConversationTurn, Question, Role, Route, SourceKind};

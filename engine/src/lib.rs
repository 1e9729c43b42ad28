//! fundrag engine library
//!
//! Question routing, multi-source retrieval, evidence merging and grounded
//! answer synthesis for fund research. Used by the `fundrag` binary and by
//! the integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// LLM provider abstraction layer
pub mod llm;

/// Route classifier
pub mod classifier;

/// Source adapters and their collaborator clients
pub mod sources;

/// Evidence merger
pub mod merger;

/// Answer synthesis
pub mod synthesis;

/// Event protocol between a run and its caller
pub mod session;

/// Route dispatch, HYBRID fan-out and the CHAIN state machine
pub mod orchestrator;

/// PII pre-screening
pub mod pii;

/// Component wiring
pub mod app;

/// HTTP transport
pub mod server;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

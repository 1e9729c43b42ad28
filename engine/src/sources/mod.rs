//! Source Adapters
//!
//! Each adapter wraps one external retrieval capability (structured fund
//! records, semantic fund search, macro-outlook search) behind the same
//! `fetch(question, constraints)` contract and shapes raw results into
//! [`EvidenceItem`]s. Adapters never abort a request on their own: the
//! orchestrator converts every failure into an [`AdapterOutcome`] and decides
//! whether it is partial or total.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::{Question, SourceKind};
use serde::Serialize;
use std::time::{Duration, Instant};

pub mod fund_store;
pub mod macro_outlook;
pub mod search;
pub mod semantic;
pub mod sql_generator;
pub mod structured;

pub use fund_store::FundStore;
pub use macro_outlook::MacroOutlookAdapter;
pub use search::{SearchClient, SearchQuery};
pub use semantic::SemanticAdapter;
pub use sql_generator::QueryGenerator;
pub use structured::StructuredAdapter;

/// Errors raised by a single adapter call
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("no results")]
    Empty,

    #[error("query generation failed: {0}")]
    QueryGeneration(String),

    #[error("generated query is not a read-only SELECT")]
    WriteQueryNotAllowed,
}

/// One retrieved fact or passage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub source: SourceKind,
    /// Stable identifier within the source
    pub id: String,
    pub title: String,
    pub excerpt: String,
    /// Relevance in [0, 1]
    pub score: f64,
    pub retrieved_at: DateTime<Utc>,
}

impl EvidenceItem {
    /// Build an item stamped with the current time; the score is clamped to [0, 1]
    pub fn new(
        source: SourceKind,
        id: impl Into<String>,
        title: impl Into<String>,
        excerpt: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            source,
            id: id.into(),
            title: title.into(),
            excerpt: excerpt.into(),
            score: clamp_score(score),
            retrieved_at: Utc::now(),
        }
    }
}

/// Clamp a raw score into [0, 1]. NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Normalize raw search scores by the batch maximum
pub fn normalize_by_max(scores: &[f64]) -> Vec<f64> {
    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0_f64, f64::max);
    scores
        .iter()
        .map(|&s| if max > 0.0 { clamp_score(s / max) } else { 0.0 })
        .collect()
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Filter/ranking hints passed to an adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchConstraints {
    /// Free-text hints appended to the adapter's native query
    pub hints: Vec<String>,
    /// Override of the adapter's default result count
    pub top_k: Option<usize>,
}

impl FetchConstraints {
    pub fn with_hints(hints: Vec<String>) -> Self {
        Self { hints, top_k: None }
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty() && self.top_k.is_none()
    }

    /// Question text with the hints appended, as most search backends expect
    pub fn augment(&self, text: &str) -> String {
        if self.hints.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", text, self.hints.join(" "))
        }
    }
}

/// What a successful adapter call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub items: Vec<EvidenceItem>,
    /// Native query the adapter generated, if any
    pub generated_query: Option<String>,
}

impl Evidence {
    pub fn items(items: Vec<EvidenceItem>) -> Self {
        Self {
            items,
            generated_query: None,
        }
    }
}

/// Uniform contract every retrieval source implements
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Deadline for one fetch
    fn timeout(&self) -> Duration;

    async fn fetch(
        &self,
        question: &Question,
        constraints: &FetchConstraints,
    ) -> Result<Evidence, SourceError>;
}

/// Settled result of one adapter call
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub kind: SourceKind,
    pub result: Result<Evidence, SourceError>,
    pub elapsed: Duration,
}

impl AdapterOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn items(&self) -> &[EvidenceItem] {
        match &self.result {
            Ok(evidence) => &evidence.items,
            Err(_) => &[],
        }
    }

    pub fn generated_query(&self) -> Option<&str> {
        self.result
            .as_ref()
            .ok()
            .and_then(|evidence| evidence.generated_query.as_deref())
    }
}

/// Run one adapter under its own timeout. An empty result is reported as a failure.
pub async fn fetch_with_timeout(
    adapter: &dyn SourceAdapter,
    question: &Question,
    constraints: &FetchConstraints,
) -> AdapterOutcome {
    let kind = adapter.kind();
    let deadline = adapter.timeout();
    let started = Instant::now();
    tracing::debug!(source = %kind, timeout_ms = deadline.as_millis() as u64, "Fetching evidence");

    let result = match tokio::time::timeout(deadline, adapter.fetch(question, constraints)).await {
        Ok(Ok(evidence)) if evidence.items.is_empty() => Err(SourceError::Empty),
        Ok(Ok(evidence)) => Ok(evidence),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SourceError::Timeout(deadline)),
    };

    let elapsed = started.elapsed();
    match &result {
        Ok(evidence) => tracing::debug!(
            source = %kind,
            items = evidence.items.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Source returned evidence"
        ),
        Err(e) => tracing::warn!(source = %kind, elapsed_ms = elapsed.as_millis() as u64, "Source failed: {}", e),
    }

    AdapterOutcome {
        kind,
        result,
        elapsed,
    }
}

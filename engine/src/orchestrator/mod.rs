//! Orchestrator
//!
//! Single entry point for a question: classify, dispatch to one adapter, all
//! three in parallel (HYBRID) or the CHAIN state machine, merge, synthesize,
//! and stream the staged events. Every run is independent; the orchestrator
//! holds no mutable state between requests.

mod chain;

pub use chain::{derive_constraints, ChainConstraints, Tilt};

use crate::classifier::RouteClassifier;
use crate::merger::{merge, Citation, DEFAULT_MAX_CITATIONS};
use crate::session::{EventSink, Pacing, SinkError, StreamEvent, StreamingSession};
use crate::sources::{fetch_with_timeout, AdapterOutcome, FetchConstraints, SourceAdapter, SourceError};
use crate::synthesis::{SynthesisContext, Synthesizer};
use sdk::{Question, Route, SourceKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Fatal outcomes of a run, surfaced as a single `error` event
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The only source of a single-route request, or the chain's outlook fetch, failed
    #[error("{} unavailable: {reason}", describe(.kind))]
    TotalSourceFailure {
        kind: SourceKind,
        reason: SourceError,
    },

    #[error("none of the data sources could answer the question")]
    AllSourcesFailed,

    #[error(transparent)]
    Session(#[from] SinkError),
}

impl OrchestrationError {
    /// Message for the caller's `error` event
    pub fn user_message(&self) -> String {
        match self {
            OrchestrationError::TotalSourceFailure { kind, reason } => match reason {
                SourceError::Timeout(_) => format!(
                    "I couldn't reach the {} in time. Please try again.",
                    describe(kind)
                ),
                SourceError::Empty => format!(
                    "The {} had no results for this question. Try rephrasing it.",
                    describe(kind)
                ),
                SourceError::WriteQueryNotAllowed => {
                    "That request would modify data, which isn't allowed.".to_string()
                }
                _ => format!(
                    "The {} couldn't be queried for this question.",
                    describe(kind)
                ),
            },
            OrchestrationError::AllSourcesFailed => {
                "None of the data sources could answer this question. Please try again.".to_string()
            }
            OrchestrationError::Session(e) => e.to_string(),
        }
    }
}

fn describe(source: &SourceKind) -> &'static str {
    match source {
        SourceKind::Sql => "fund database",
        SourceKind::Semantic => "fund search",
        SourceKind::Raptor => "economic outlook",
    }
}

/// The three retrieval sources
#[derive(Clone)]
pub struct Adapters {
    pub structured: Arc<dyn SourceAdapter>,
    pub semantic: Arc<dyn SourceAdapter>,
    pub macro_outlook: Arc<dyn SourceAdapter>,
}

impl Adapters {
    fn for_kind(&self, kind: SourceKind) -> &Arc<dyn SourceAdapter> {
        match kind {
            SourceKind::Sql => &self.structured,
            SourceKind::Semantic => &self.semantic,
            SourceKind::Raptor => &self.macro_outlook,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub max_citations: usize,
    pub pacing: Pacing,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_citations: DEFAULT_MAX_CITATIONS,
            pacing: Pacing::default(),
        }
    }
}

/// Evidence ready for synthesis
#[derive(Debug, Clone, Default)]
pub(crate) struct Gathered {
    pub citations: Vec<Citation>,
    pub generated_query: Option<String>,
    pub constraints: Vec<String>,
}

pub struct Orchestrator {
    classifier: RouteClassifier,
    adapters: Adapters,
    synthesizer: Synthesizer,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        classifier: RouteClassifier,
        adapters: Adapters,
        synthesizer: Synthesizer,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            classifier,
            adapters,
            synthesizer,
            settings,
        }
    }

    pub fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    /// Start a run. Dropping the returned session cancels it.
    pub fn run(self: &Arc<Self>, question: Question) -> StreamingSession {
        let orchestrator = Arc::clone(self);
        let span = info_span!(
            "run",
            request_id = %Uuid::new_v4(),
            route = tracing::field::Empty
        );
        StreamingSession::spawn(move |sink| {
            async move { orchestrator.execute(question, sink).await }.instrument(span)
        })
    }

    async fn execute(&self, question: Question, mut sink: EventSink) {
        let started = Instant::now();
        let classification = self.classifier.classify(&question).await;
        let route = classification.route;
        tracing::Span::current().record("route", route.as_str());
        info!(method = ?classification.method, "Routed question to {}", route);

        let gathered = match route {
            Route::Sql | Route::Semantic | Route::Raptor => self.single(route, &question).await,
            Route::Hybrid => self.hybrid(&question).await,
            Route::Chain => chain::run_chain(self, &question, &mut sink).await,
        };

        let gathered = match gathered {
            Ok(gathered) => gathered,
            Err(OrchestrationError::Session(e)) => {
                info!("Run abandoned: {}", e);
                return;
            }
            Err(e) => {
                tracing::error!("Run failed: {}", e);
                let _ = sink.emit(StreamEvent::error(e.user_message())).await;
                return;
            }
        };

        if let Err(e) = self
            .finish(&question, route, classification.reasoning, gathered, &mut sink)
            .await
        {
            info!("Run abandoned: {}", e);
            return;
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );
    }

    /// Exactly one adapter; its failure is fatal
    async fn single(&self, route: Route, question: &Question) -> Result<Gathered, OrchestrationError> {
        let kind = match route {
            Route::Sql => SourceKind::Sql,
            Route::Raptor => SourceKind::Raptor,
            _ => SourceKind::Semantic,
        };
        let adapter = self.adapters.for_kind(kind);
        let outcome = fetch_with_timeout(adapter.as_ref(), question, &FetchConstraints::default()).await;

        match outcome.result {
            Ok(evidence) => Ok(Gathered {
                citations: merge([evidence.items], self.settings.max_citations),
                generated_query: evidence.generated_query,
                constraints: Vec::new(),
            }),
            Err(reason) => Err(OrchestrationError::TotalSourceFailure { kind, reason }),
        }
    }

    /// All three adapters concurrently, each under its own timeout; join all, then merge
    async fn hybrid(&self, question: &Question) -> Result<Gathered, OrchestrationError> {
        let mut tasks = JoinSet::new();
        for kind in SourceKind::ALL {
            let adapter = Arc::clone(self.adapters.for_kind(kind));
            let question = question.clone();
            tasks.spawn(async move {
                fetch_with_timeout(adapter.as_ref(), &question, &FetchConstraints::default()).await
            });
        }

        let mut outcomes: Vec<AdapterOutcome> = Vec::with_capacity(SourceKind::ALL.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Adapter task ended abnormally: {}", e),
            }
        }
        outcomes.sort_by_key(|o| o.kind);

        let failed: Vec<SourceKind> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.kind)
            .collect();
        if !failed.is_empty() {
            warn!(?failed, "Partial source failure");
        }
        if outcomes.iter().all(|o| !o.is_success()) {
            return Err(OrchestrationError::AllSourcesFailed);
        }

        let generated_query = outcomes
            .iter()
            .find_map(|o| o.generated_query().map(str::to_string));
        let citations = merge(
            outcomes.iter().map(|o| o.items().to_vec()),
            self.settings.max_citations,
        );

        Ok(Gathered {
            citations,
            generated_query,
            constraints: Vec::new(),
        })
    }

    /// metadata, citations, synthesis, tokens, answer
    async fn finish(
        &self,
        question: &Question,
        route: Route,
        reasoning: String,
        gathered: Gathered,
        sink: &mut EventSink,
    ) -> Result<(), SinkError> {
        let exposed_query = gathered
            .generated_query
            .clone()
            .filter(|_| route.exposes_generated_query());

        sink.emit(StreamEvent::Metadata {
            route,
            generated_query: exposed_query,
            reasoning: reasoning.clone(),
        })
        .await?;
        sink.emit(StreamEvent::Citations {
            citations: gathered.citations.clone(),
        })
        .await?;

        let result = self
            .synthesizer
            .synthesize(
                question,
                gathered.citations,
                route,
                SynthesisContext {
                    reasoning,
                    generated_query: gathered.generated_query,
                    constraints: gathered.constraints,
                },
            )
            .await;
        info!(
            citations = result.citations.len(),
            verified = result.verified,
            "Answer ready"
        );

        sink.stream_tokens(&result.answer, self.settings.pacing)
            .await?;
        sink.emit(StreamEvent::Answer {
            answer: result.answer,
            verified: result.verified,
        })
        .await
    }
}

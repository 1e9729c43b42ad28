//! Application wiring
//!
//! Builds every collaborator from [`Config`] and exposes the one operation
//! both transports need: screen a question, then hand back its event stream.

use crate::classifier::RouteClassifier;
use crate::config::Config;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::OpenAIProvider;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::orchestrator::{Adapters, Orchestrator, OrchestratorSettings};
use crate::pii::{HttpPiiGate, NoopGate, PiiGate};
use crate::session::{Pacing, StreamEvent, StreamingSession};
use crate::sources::{
    FundStore, MacroOutlookAdapter, QueryGenerator, SearchClient, SemanticAdapter,
    StructuredAdapter,
};
use crate::synthesis::Synthesizer;
use sdk::errors::EngineError;
use sdk::Question;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A screened run
pub struct Screened {
    pub session: StreamingSession,
    pub pii_blocked: bool,
}

#[derive(Clone)]
pub struct App {
    orchestrator: Arc<Orchestrator>,
    pii: Arc<dyn PiiGate>,
}

impl App {
    pub fn new(orchestrator: Arc<Orchestrator>, pii: Arc<dyn PiiGate>) -> Self {
        Self { orchestrator, pii }
    }

    /// Build the full pipeline from configuration
    pub async fn from_config(config: &Config) -> Result<Self, EngineError> {
        let router = Arc::new(build_llm_router(config));

        let search = Arc::new(SearchClient::from_config(&config.search)?);
        let store = FundStore::connect(&config.database.url).await?;

        let adapters = Adapters {
            structured: Arc::new(StructuredAdapter::new(
                QueryGenerator::new(Arc::clone(&router)),
                store,
                config.database.max_rows,
                config.timeouts.structured(),
            )),
            semantic: Arc::new(SemanticAdapter::new(
                Arc::clone(&search),
                &config.search.fund_index,
                &config.search.fund_vector_field,
                config.search.semantic_top_k,
                config.timeouts.semantic(),
            )),
            macro_outlook: Arc::new(MacroOutlookAdapter::new(
                search,
                &config.search.macro_index,
                &config.search.macro_vector_field,
                config.search.macro_top_k,
                config.timeouts.macro_outlook(),
            )),
        };

        let classifier = RouteClassifier::with_model(
            Arc::clone(&router),
            config.classifier.model_assisted,
            config.timeouts.classifier(),
        );
        let synthesizer = Synthesizer::new(router, config.timeouts.synthesis());
        let settings = OrchestratorSettings {
            max_citations: config.merger.max_citations,
            pacing: Pacing {
                chunk_words: config.streaming.chunk_words,
                delay: Duration::from_millis(config.streaming.chunk_delay_ms),
            },
        };

        let pii: Arc<dyn PiiGate> = if config.pii.enabled {
            Arc::new(HttpPiiGate::from_config(&config.pii))
        } else {
            debug!("PII screening disabled");
            Arc::new(NoopGate)
        };

        info!("Pipeline ready");
        Ok(Self::new(
            Arc::new(Orchestrator::new(classifier, adapters, synthesizer, settings)),
            pii,
        ))
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Screen the question, then start its run. A blocked question yields a
    /// session holding a single `error` event.
    pub async fn ask(&self, question: Question) -> Screened {
        let check = self.pii.check(&question.text).await;
        if check.blocked {
            let warning = check.warning();
            return Screened {
                session: StreamingSession::spawn(move |mut sink| async move {
                    let _ = sink.emit(StreamEvent::error(warning)).await;
                }),
                pii_blocked: true,
            };
        }

        Screened {
            session: self.orchestrator.run(question),
            pii_blocked: false,
        }
    }
}

/// Ollama is always available; OpenAI joins when its key is exported
pub fn build_llm_router(config: &Config) -> LLMRouter {
    let mut providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(OllamaProvider::new(
        config.llm.ollama.base_url.clone(),
        config.llm.ollama.model.clone(),
    ))];

    match OpenAIProvider::from_env(config.llm.openai.clone()) {
        Ok(provider) => providers.push(Box::new(provider)),
        Err(e) => debug!("OpenAI provider skipped: {}", e),
    }

    LLMRouter::new(providers, Arc::new(config.llm.clone()))
}

//! Shared fixtures: scripted source adapters and a canned language model

#![allow(dead_code)]

use async_trait::async_trait;
use fundrag_engine::classifier::RouteClassifier;
use fundrag_engine::config::LLMConfig;
use fundrag_engine::llm::router::LLMRouter;
use fundrag_engine::llm::{LLMError, LLMProvider, Message};
use fundrag_engine::orchestrator::{Adapters, Orchestrator, OrchestratorSettings};
use fundrag_engine::session::{Pacing, StreamEvent};
use fundrag_engine::sources::{
    Evidence, EvidenceItem, FetchConstraints, SourceAdapter, SourceError,
};
use fundrag_engine::synthesis::Synthesizer;
use sdk::{Question, SourceKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub enum Script {
    Items(Vec<EvidenceItem>),
    /// Items plus the native query that produced them
    Query(Vec<EvidenceItem>, String),
    Fail,
    /// Sleeps well past the adapter timeout
    Hang,
}

/// Adapter that replays a script and records how it was called
pub struct ScriptedAdapter {
    kind: SourceKind,
    script: Script,
    timeout: Duration,
    pub calls: AtomicUsize,
    pub hints: Mutex<Vec<String>>,
    /// Set when a fetch future was dropped before finishing
    pub abandoned: Arc<AtomicBool>,
}

impl ScriptedAdapter {
    pub fn new(kind: SourceKind, script: Script) -> Arc<Self> {
        Self::with_timeout(kind, script, Duration::from_millis(200))
    }

    pub fn with_timeout(kind: SourceKind, script: Script, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script,
            timeout,
            calls: AtomicUsize::new(0),
            hints: Mutex::new(Vec::new()),
            abandoned: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_hints(&self) -> Vec<String> {
        self.hints.lock().unwrap().clone()
    }
}

struct AbandonGuard {
    flag: Arc<AtomicBool>,
    finished: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(
        &self,
        _question: &Question,
        constraints: &FetchConstraints,
    ) -> Result<Evidence, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hints
            .lock()
            .unwrap()
            .extend(constraints.hints.iter().cloned());

        let mut guard = AbandonGuard {
            flag: Arc::clone(&self.abandoned),
            finished: false,
        };
        let result = match &self.script {
            Script::Items(items) => Ok(Evidence::items(items.clone())),
            Script::Query(items, sql) => Ok(Evidence {
                items: items.clone(),
                generated_query: Some(sql.clone()),
            }),
            Script::Fail => Err(SourceError::Upstream("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Evidence::default())
            }
        };
        guard.finished = true;
        result
    }
}

pub fn item(source: SourceKind, id: &str, excerpt: &str, score: f64) -> EvidenceItem {
    EvidenceItem::new(source, id, format!("{} title", id), excerpt, score)
}

/// Language model with a fixed reply that records every prompt
pub struct CannedModel {
    reply: Option<String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl CannedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LLMProvider for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Message]) -> fundrag_engine::llm::Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        self.reply
            .clone()
            .ok_or_else(|| LLMError::ProviderUnavailable("model offline".to_string()))
    }
}

pub struct Fixture {
    pub structured: Arc<ScriptedAdapter>,
    pub semantic: Arc<ScriptedAdapter>,
    pub macro_outlook: Arc<ScriptedAdapter>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Fixture {
    pub fn new(structured: Script, semantic: Script, macro_outlook: Script) -> Self {
        Self::with_model(
            structured,
            semantic,
            macro_outlook,
            CannedModel::replying("Core Bond Fund leads on assets [1]."),
        )
    }

    pub fn with_model(
        structured: Script,
        semantic: Script,
        macro_outlook: Script,
        model: CannedModel,
    ) -> Self {
        Self::from_adapters(
            ScriptedAdapter::new(SourceKind::Sql, structured),
            ScriptedAdapter::new(SourceKind::Semantic, semantic),
            ScriptedAdapter::new(SourceKind::Raptor, macro_outlook),
            model,
        )
    }

    pub fn from_adapters(
        structured: Arc<ScriptedAdapter>,
        semantic: Arc<ScriptedAdapter>,
        macro_outlook: Arc<ScriptedAdapter>,
        model: CannedModel,
    ) -> Self {
        let prompts = Arc::clone(&model.prompts);

        let router = Arc::new(LLMRouter::new(
            vec![Box::new(model)],
            Arc::new(LLMConfig::default()),
        ));
        let orchestrator = Orchestrator::new(
            RouteClassifier::heuristic(),
            Adapters {
                structured: structured.clone(),
                semantic: semantic.clone(),
                macro_outlook: macro_outlook.clone(),
            },
            Synthesizer::new(router, Duration::from_secs(2)),
            OrchestratorSettings {
                max_citations: 8,
                pacing: Pacing {
                    chunk_words: 3,
                    delay: Duration::ZERO,
                },
            },
        );

        Self {
            structured,
            semantic,
            macro_outlook,
            prompts,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub async fn ask(&self, question: &str) -> Vec<StreamEvent> {
        self.orchestrator
            .run(Question::new(question))
            .collect_events()
            .await
    }
}

pub fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = events.iter().map(StreamEvent::kind).collect();
    kinds.dedup_by(|a, b| *a == "token" && *b == "token");
    kinds
}

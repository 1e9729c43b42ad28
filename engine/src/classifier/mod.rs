//! Route Classifier
//!
//! Maps a question to one of the five retrieval routes. The default path is a
//! zero-latency heuristic over keyword signals; follow-up questions with no
//! signal of their own inherit the intent of the previous user turn. An
//! optional model-assisted path handles questions that are still ambiguous.
//!
//! Classification never fails: anything unmatched lands on `SEMANTIC`.

mod signals;

pub use signals::Signals;

use crate::llm::router::LLMRouter;
use crate::llm::{extract_json_object, Message};
use sdk::{Question, Route};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const ROUTING_PROMPT: &str = r#"You are a query router for a fund research assistant. Classify the user's question into exactly one retrieval strategy:

- SQL: precise lookups, rankings, counts or comparisons over structured fund records (assets, holdings, CUSIP, interest rate risk).
- SEMANTIC: fund style, characteristics or similarity ("conservative", "income-focused", "funds like X").
- RAPTOR: macroeconomic outlook questions answered from IMF World Economic Outlook reports.
- HYBRID: fund questions that also need economic context.
- CHAIN: "how should I" or conditional questions where the economic outlook decides which funds to pick.

Respond with a single JSON object and nothing else:
{"route": "SQL|SEMANTIC|RAPTOR|HYBRID|CHAIN", "reasoning": "one short sentence"}"#;

/// How a route was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// Signals found in the question itself
    Heuristic,
    /// Signals found in the previous user turn
    History,
    /// Model-assisted classification
    Model,
    /// Nothing matched
    Default,
}

/// Outcome of classifying one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub route: Route,
    pub reasoning: String,
    pub method: ClassificationMethod,
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    route: String,
    #[serde(default)]
    reasoning: String,
}

/// Heuristic route classifier with an optional model-assisted fallback
pub struct RouteClassifier {
    router: Option<Arc<LLMRouter>>,
    model_assisted: bool,
    timeout: Duration,
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl RouteClassifier {
    /// Heuristics only
    pub fn heuristic() -> Self {
        Self {
            router: None,
            model_assisted: false,
            timeout: Duration::from_secs(5),
        }
    }

    /// Heuristics first; ambiguous questions go to the model when `model_assisted` is set
    pub fn with_model(router: Arc<LLMRouter>, model_assisted: bool, timeout: Duration) -> Self {
        Self {
            router: Some(router),
            model_assisted,
            timeout,
        }
    }

    pub fn is_model_assisted(&self) -> bool {
        self.model_assisted && self.router.is_some()
    }

    /// Pure heuristic classification. Same question and history, same route.
    pub fn classify_heuristic(question: &Question) -> Classification {
        let signals = Signals::detect(&question.text);
        if let Some(route) = signals.best_route() {
            return Classification {
                route,
                reasoning: format!("Matched {} signals", signals.describe()),
                method: ClassificationMethod::Heuristic,
            };
        }

        if let Some(previous) = question.last_user_turn() {
            let previous_signals = Signals::detect(previous);
            if let Some(route) = previous_signals.best_route() {
                return Classification {
                    route,
                    reasoning: format!(
                        "Follow-up; previous question matched {} signals",
                        previous_signals.describe()
                    ),
                    method: ClassificationMethod::History,
                };
            }
        }

        Classification {
            route: Route::Semantic,
            reasoning: "No routing signals; using semantic search".to_string(),
            method: ClassificationMethod::Default,
        }
    }

    /// Classify a question. Never fails.
    pub async fn classify(&self, question: &Question) -> Classification {
        let heuristic = Self::classify_heuristic(question);
        if heuristic.method != ClassificationMethod::Default || !self.is_model_assisted() {
            return heuristic;
        }

        match self.classify_with_model(question).await {
            Some(classification) => classification,
            None => heuristic,
        }
    }

    async fn classify_with_model(&self, question: &Question) -> Option<Classification> {
        let router = self.router.as_ref()?;
        let mut messages = vec![Message::system(ROUTING_PROMPT)];
        if let Some(previous) = question.last_user_turn() {
            messages.push(Message::user(format!("Previous question: {}", previous)));
        }
        messages.push(Message::user(question.text.clone()));

        let reply = match tokio::time::timeout(self.timeout, router.call(&messages)).await {
            Ok(Ok((text, provider))) => {
                tracing::debug!("Routing verdict from {}", provider);
                text
            }
            Ok(Err(e)) => {
                tracing::warn!("Model-assisted routing failed: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    "Model-assisted routing timed out after {}ms",
                    self.timeout.as_millis()
                );
                return None;
            }
        };

        parse_verdict(&reply)
    }
}

/// Parse the model's JSON verdict; unknown routes are rejected
fn parse_verdict(reply: &str) -> Option<Classification> {
    let json = extract_json_object(reply)?;
    let verdict: ModelVerdict = serde_json::from_str(json).ok()?;
    let route = verdict.route.parse::<Route>().ok()?;
    Some(Classification {
        route,
        reasoning: if verdict.reasoning.is_empty() {
            "Model-assisted routing".to_string()
        } else {
            verdict.reasoning
        },
        method: ClassificationMethod::Model,
    })
}

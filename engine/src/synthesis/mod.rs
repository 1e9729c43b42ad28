//! Synthesis Invoker
//!
//! Builds the answer prompt from the merged citations only and calls the
//! language model under a fixed deadline. A failed or late model call still
//! yields a result: the answer becomes a fixed fallback message and the
//! citations stay attached.

use crate::llm::router::LLMRouter;
use crate::llm::Message;
use crate::merger::Citation;
use sdk::{Question, Role, Route};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Answer text used when the model call fails or times out
pub const SYNTHESIS_FALLBACK: &str =
    "I wasn't able to compose an answer in time. The evidence retrieved for your question is listed in the citations.";

/// Prior turns included in the prompt
const HISTORY_TURNS: usize = 4;

/// Final outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisResult {
    pub answer: String,
    pub route: Route,
    /// Present only for SQL and HYBRID
    pub generated_query: Option<String>,
    pub reasoning: String,
    /// True iff at least one citation backs the answer
    pub verified: bool,
    pub citations: Vec<Citation>,
}

/// Route-level facts that shape the prompt and the result
#[derive(Debug, Clone, Default)]
pub struct SynthesisContext {
    pub reasoning: String,
    pub generated_query: Option<String>,
    /// Constraints derived from the macro outlook (CHAIN only)
    pub constraints: Vec<String>,
}

pub fn route_instruction(route: Route) -> &'static str {
    match route {
        Route::Sql => "Focus on the precise data from the structured fund records.",
        Route::Semantic => "Focus on fund characteristics and similarity.",
        Route::Raptor => "Focus on the macroeconomic outlook and its implications.",
        Route::Hybrid => "Combine fund data with economic context for a comprehensive answer.",
        Route::Chain => "Explain how the economic outlook influences the fund recommendations.",
    }
}

pub struct Synthesizer {
    router: Arc<LLMRouter>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(router: Arc<LLMRouter>, timeout: Duration) -> Self {
        Self { router, timeout }
    }

    pub async fn synthesize(
        &self,
        question: &Question,
        citations: Vec<Citation>,
        route: Route,
        context: SynthesisContext,
    ) -> SynthesisResult {
        let messages = build_prompt(question, &citations, route, &context);

        let answer = match tokio::time::timeout(self.timeout, self.router.call(&messages)).await {
            Ok(Ok((text, provider))) => {
                tracing::debug!("Answer synthesized by {}", provider);
                text.trim().to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!("Synthesis failed: {}", e);
                SYNTHESIS_FALLBACK.to_string()
            }
            Err(_) => {
                tracing::warn!("Synthesis timed out after {}ms", self.timeout.as_millis());
                SYNTHESIS_FALLBACK.to_string()
            }
        };

        SynthesisResult {
            answer,
            route,
            generated_query: context
                .generated_query
                .filter(|_| route.exposes_generated_query()),
            reasoning: context.reasoning,
            verified: !citations.is_empty(),
            citations,
        }
    }
}

/// System + user messages for the answer model
pub fn build_prompt(
    question: &Question,
    citations: &[Citation],
    route: Route,
    context: &SynthesisContext,
) -> Vec<Message> {
    let system = format!(
        "You are a helpful mutual fund analyst assistant.\n\
         Answer the user's question using only the numbered evidence provided.\n\
         {}\n\n\
         Guidelines:\n\
         - Be concise but informative\n\
         - Cite evidence inline with its number, e.g. [1] or [2][3]\n\
         - Format numbers nicely (e.g. $2.5B instead of 2500000000)\n\
         - Use a clear list when showing several funds\n\
         - If the evidence is insufficient, say so clearly",
        route_instruction(route)
    );

    let mut user = String::new();
    let skip = question.history.len().saturating_sub(HISTORY_TURNS);
    let history = &question.history[skip..];
    if !history.is_empty() {
        user.push_str("Conversation so far:\n");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            user.push_str(&format!("{}: {}\n", speaker, turn.text));
        }
        user.push('\n');
    }

    user.push_str(&format!("Question: {}\n", question.text));
    user.push_str(&format!("Retrieval route: {}\n", route));

    if !context.constraints.is_empty() {
        user.push_str("\nFund selection constraints derived from the outlook:\n");
        for constraint in &context.constraints {
            user.push_str(&format!("- {}\n", constraint));
        }
    }

    user.push_str("\nEvidence:\n");
    if citations.is_empty() {
        user.push_str("(none)\n");
    }
    for citation in citations {
        user.push_str(&format!(
            "[{}] ({}) {}\n{}\n\n",
            citation.number, citation.source, citation.title, citation.excerpt
        ));
    }

    vec![Message::system(system), Message::user(user)]
}

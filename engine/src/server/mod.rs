//! HTTP transport
//!
//! # Endpoints
//!
//! - GET  /health            - Liveness probe
//! - POST /api/chat          - Answer a question, collected into one JSON body
//! - POST /api/chat/stream   - Answer a question as Server-Sent Events
//!
//! A client that disconnects from the stream drops its session, which cancels
//! the run and every source call still in flight.

use crate::app::App;
use crate::merger::Citation;
use crate::session::{StreamEvent, Transcript};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use sdk::errors::EngineError;
use sdk::{ConversationTurn, Question, Route};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    fn into_question(self) -> Result<Question, Response> {
        match self.message {
            Some(message) if !message.trim().is_empty() => {
                Ok(Question::new(message).with_history(self.history))
            }
            _ => Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Missing 'message' field"})),
            )
                .into_response()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub route: Option<Route>,
    pub reasoning: Option<String>,
    pub citations: Vec<Citation>,
    pub verified: bool,
    pub generated_query: Option<String>,
    pub pii_blocked: bool,
    pub pii_warning: Option<String>,
}

pub fn router(app: App) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Bind and serve until Ctrl-C
pub async fn serve(app: App, bind: &str) -> Result<(), EngineError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", bind, e)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .map_err(|e| EngineError::Network(format!("Server error: {}", e)))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "service": "fundrag"}))
}

async fn chat(State(app): State<App>, Json(request): Json<ChatRequest>) -> Response {
    let question = match request.into_question() {
        Ok(question) => question,
        Err(rejection) => return rejection,
    };

    let screened = app.ask(question).await;
    let transcript = Transcript::from_events(screened.session.collect_events().await);

    if screened.pii_blocked {
        let warning = transcript.error.unwrap_or_default();
        return Json(ChatResponse {
            answer: warning.clone(),
            route: None,
            reasoning: None,
            citations: Vec::new(),
            verified: false,
            generated_query: None,
            pii_blocked: true,
            pii_warning: Some(warning),
        })
        .into_response();
    }

    match (transcript.answer, transcript.error) {
        (Some(answer), _) => Json(ChatResponse {
            answer,
            route: transcript.route,
            reasoning: transcript.reasoning,
            citations: transcript.citations,
            verified: transcript.verified,
            generated_query: transcript.generated_query,
            pii_blocked: false,
            pii_warning: None,
        })
        .into_response(),
        (None, error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": error.unwrap_or_else(|| "The request ended unexpectedly.".to_string()),
                "route": transcript.route,
            })),
        )
            .into_response(),
    }
}

async fn chat_stream(State(app): State<App>, Json(request): Json<ChatRequest>) -> Response {
    let question = match request.into_question() {
        Ok(question) => question,
        Err(rejection) => return rejection,
    };

    let screened = app.ask(question).await;
    Sse::new(sse_events(screened.session))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn sse_events(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    events.map(|event| Ok(to_sse(&event)))
}

/// One SSE frame per stream event; the `event:` field carries the type tag
pub fn to_sse(event: &StreamEvent) -> Event {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to encode stream event: {}", e);
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"Failed to encode event"}"#)
        }
    }
}

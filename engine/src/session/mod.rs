//! Streaming Session
//!
//! One orchestration run writes its events into an [`EventSink`]; the caller
//! reads them from the matching [`StreamingSession`]. The protocol per request
//! is strict:
//!
//! ```text
//! progress* metadata citations token* (answer | error)
//! ```
//!
//! or a lone `error` when nothing could be gathered. The sink refuses any
//! event that would break that order and closes the channel exactly once,
//! after the terminal event. Dropping the session aborts the producing task,
//! which cancels every adapter or model call still in flight.

use crate::merger::Citation;
use futures::Stream;
use sdk::Route;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events buffered between producer and consumer
const CHANNEL_CAPACITY: usize = 64;

/// Stages of the CHAIN route that are announced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FetchMacro,
    FetchSecondary,
    Synthesize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FetchMacro => "fetch-macro",
            Stage::FetchSecondary => "fetch-secondary",
            Stage::Synthesize => "synthesize",
        }
    }

    /// Caller-facing status line
    pub fn message(self) -> &'static str {
        match self {
            Stage::FetchMacro => "Fetching economic outlook...",
            Stage::FetchSecondary => "Selecting funds...",
            Stage::Synthesize => "Composing answer...",
        }
    }
}

/// One record of the event stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress {
        stage: Stage,
        message: String,
    },
    Metadata {
        route: Route,
        generated_query: Option<String>,
        reasoning: String,
    },
    Citations {
        citations: Vec<Citation>,
    },
    /// Cosmetic chunk of the answer text
    Token {
        text: String,
    },
    Answer {
        answer: String,
        verified: bool,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn progress(stage: Stage) -> Self {
        StreamEvent::Progress {
            stage,
            message: stage.message().to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// The `type` tag on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Metadata { .. } => "metadata",
            StreamEvent::Citations { .. } => "citations",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Answer { .. } => "answer",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Answer { .. } | StreamEvent::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("session closed by the caller")]
    Disconnected,

    #[error("event {event} not allowed after {after}")]
    OutOfOrder {
        event: &'static str,
        after: &'static str,
    },

    #[error("session already finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Progress,
    Metadata,
    Citations,
    Tokens,
    Closed,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Progress => "start",
            Phase::Metadata => "metadata",
            Phase::Citations => "citations",
            Phase::Tokens => "token",
            Phase::Closed => "terminal event",
        }
    }

    fn next(self, event: &StreamEvent) -> Option<Phase> {
        match (self, event) {
            (Phase::Closed, _) => None,
            (_, StreamEvent::Error { .. }) => Some(Phase::Closed),
            (Phase::Progress, StreamEvent::Progress { .. }) => Some(Phase::Progress),
            (Phase::Progress, StreamEvent::Metadata { .. }) => Some(Phase::Metadata),
            (Phase::Metadata, StreamEvent::Citations { .. }) => Some(Phase::Citations),
            (Phase::Citations | Phase::Tokens, StreamEvent::Token { .. }) => Some(Phase::Tokens),
            (Phase::Citations | Phase::Tokens, StreamEvent::Answer { .. }) => Some(Phase::Closed),
            _ => None,
        }
    }
}

/// Producer half of a session. Sole writer, closes exactly once.
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
    phase: Phase,
}

impl EventSink {
    fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx: Some(tx),
            phase: Phase::Progress,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Send one event, enforcing protocol order. A terminal event closes the channel.
    pub async fn emit(&mut self, event: StreamEvent) -> Result<(), SinkError> {
        if self.phase == Phase::Closed {
            return Err(SinkError::Finished);
        }
        let next = self.phase.next(&event).ok_or(SinkError::OutOfOrder {
            event: event.kind(),
            after: self.phase.name(),
        })?;

        let tx = self.tx.as_ref().ok_or(SinkError::Finished)?;
        let sent = tx.send(event).await;
        self.phase = next;
        if next == Phase::Closed {
            self.tx = None;
        }
        sent.map_err(|_| SinkError::Disconnected)
    }

    /// Emit the answer text in word chunks separated by the pacing delay
    pub async fn stream_tokens(&mut self, answer: &str, pacing: Pacing) -> Result<(), SinkError> {
        let chunks = answer_chunks(answer, pacing.chunk_words);
        let count = chunks.len();
        for (i, text) in chunks.into_iter().enumerate() {
            self.emit(StreamEvent::Token { text }).await?;
            if !pacing.delay.is_zero() && i + 1 < count {
                tokio::time::sleep(pacing.delay).await;
            }
        }
        Ok(())
    }
}

impl Drop for EventSink {
    fn drop(&mut self) {
        // A run that ends without its terminal event still tells the caller.
        if self.phase != Phase::Closed {
            if let Some(tx) = self.tx.take() {
                let _ = tx.try_send(StreamEvent::error("The request ended unexpectedly."));
            }
        }
    }
}

/// Answer pacing for `token` events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Words per token event; 0 disables token events
    pub chunk_words: usize,
    pub delay: Duration,
}

impl Pacing {
    pub const OFF: Pacing = Pacing {
        chunk_words: 0,
        delay: Duration::ZERO,
    };
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            chunk_words: 1,
            delay: Duration::from_millis(30),
        }
    }
}

/// Split text into chunks of `words_per_chunk` words; concatenating the chunks gives back the text
pub fn answer_chunks(text: &str, words_per_chunk: usize) -> Vec<String> {
    if words_per_chunk == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words = 0;
    for piece in text.split_inclusive(char::is_whitespace) {
        current.push_str(piece);
        if !piece.trim().is_empty() {
            words += 1;
        }
        if words == words_per_chunk {
            chunks.push(std::mem::take(&mut current));
            words = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Consumer half: an ordered, single-consumer, cancellable event stream
pub struct StreamingSession {
    rx: mpsc::Receiver<StreamEvent>,
    task: JoinHandle<()>,
}

impl StreamingSession {
    /// Spawn `producer` with a fresh sink and hand back the consuming side
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(producer(EventSink::new(tx)));
        Self { rx, task }
    }

    /// Next event, or `None` once the terminal event has been read
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drain the session into a vector
    pub async fn collect_events(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for StreamingSession {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A finished session folded into one record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    pub answer: Option<String>,
    pub route: Option<Route>,
    pub reasoning: Option<String>,
    pub generated_query: Option<String>,
    pub citations: Vec<Citation>,
    pub verified: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub stages: Vec<Stage>,
}

impl Transcript {
    pub fn from_events(events: impl IntoIterator<Item = StreamEvent>) -> Self {
        let mut transcript = Self::default();
        for event in events {
            transcript.push(event);
        }
        transcript
    }

    pub fn push(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Progress { stage, .. } => self.stages.push(stage),
            StreamEvent::Metadata {
                route,
                generated_query,
                reasoning,
            } => {
                self.route = Some(route);
                self.generated_query = generated_query;
                self.reasoning = Some(reasoning);
            }
            StreamEvent::Citations { citations } => self.citations = citations,
            StreamEvent::Token { .. } => {}
            StreamEvent::Answer { answer, verified } => {
                self.answer = Some(answer);
                self.verified = verified;
            }
            StreamEvent::Error { message } => self.error = Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

//! Command handlers for CLI operations
//!
//! - ask: Answer a question, streaming events to stdout
//! - classify: Show the route a question would take
//! - serve: Run the HTTP server
//! - config show / validate

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::app::{build_llm_router, App};
use crate::classifier::RouteClassifier;
use crate::config::Config;
use crate::session::{StreamEvent, Transcript};
use sdk::{ConversationTurn, ErrorExt, Question};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Answer a question end to end
///
/// Text output prints progress lines, the answer as it streams, and the
/// citation list. JSON output prints one event per line.
pub async fn handle_ask(
    question: String,
    previous: Vec<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let app = App::from_config(config)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.user_hint()))
        .context("Failed to start the pipeline")?;

    let question = question_with_history(question, previous);

    let mut screened = app.ask(question).await;
    let mut transcript = Transcript::default();
    let mut stdout = std::io::stdout();
    let mut streamed = false;

    while let Some(event) = screened.session.recv().await {
        match (format, &event) {
            (OutputFormat::Json, _) => writeln!(stdout, "{}", serde_json::to_string(&event)?)?,
            (OutputFormat::Text, StreamEvent::Token { .. }) => {
                streamed = true;
                write!(stdout, "{}", render_text(&event))?;
            }
            // Token events may be disabled
            (OutputFormat::Text, StreamEvent::Answer { answer, .. }) if !streamed => {
                write!(stdout, "{}{}", answer, render_text(&event))?;
            }
            (OutputFormat::Text, _) => write!(stdout, "{}", render_text(&event))?,
        }
        stdout.flush()?;
        transcript.push(event);
    }

    if let OutputFormat::Text = format {
        if !transcript.citations.is_empty() {
            println!("Sources:");
            for citation in &transcript.citations {
                println!("  {}", citation.label());
            }
        }
    }
    run_outcome(&transcript)
}

/// Question plus prior user turns given with `--previous`
pub fn question_with_history(question: String, previous: Vec<String>) -> Question {
    let history = previous.into_iter().map(ConversationTurn::user).collect();
    Question::new(question).with_history(history)
}

/// A run that ended in an error event fails the command in every format
pub fn run_outcome(transcript: &Transcript) -> Result<()> {
    match &transcript.error {
        Some(message) => Err(anyhow::anyhow!("{}", message)),
        None => Ok(()),
    }
}

/// The classifier `ask` would use for this configuration
pub fn classifier_for(config: &Config) -> RouteClassifier {
    if config.classifier.model_assisted {
        RouteClassifier::with_model(
            Arc::new(build_llm_router(config)),
            true,
            config.timeouts.classifier(),
        )
    } else {
        RouteClassifier::heuristic()
    }
}

/// Human-readable rendering of one event
pub fn render_text(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Progress { message, .. } => format!("… {}\n", message),
        StreamEvent::Metadata {
            route,
            generated_query,
            reasoning,
        } => {
            let mut out = format!("Route: {} ({})\n", route, reasoning);
            if let Some(sql) = generated_query {
                out.push_str(&format!("Query: {}\n", sql));
            }
            out.push('\n');
            out
        }
        // Listed after the answer, which streams first
        StreamEvent::Citations { .. } => String::new(),
        StreamEvent::Token { text } => text.clone(),
        StreamEvent::Answer { verified, .. } => {
            format!("\n\n{}\n", if *verified { "✓ verified" } else { "⚠ unverified" })
        }
        StreamEvent::Error { message } => format!("✗ {}\n", message),
    }
}

/// Print the route a question would take, classified exactly as `ask` does
pub async fn handle_classify(
    question: String,
    previous: Vec<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let question = question_with_history(question, previous);
    let classification = classifier_for(config).classify(&question).await;

    match format {
        OutputFormat::Text => {
            println!("{}", classification.route);
            println!("  {}", classification.reasoning);
        }
        OutputFormat::Json => {
            let output = json!({
                "route": classification.route,
                "reasoning": classification.reasoning,
                "method": classification.method,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

pub async fn handle_serve(config: &Config, bind: Option<String>) -> Result<()> {
    let app = App::from_config(config)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.user_hint()))
        .context("Failed to start the pipeline")?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    crate::server::serve(app, &bind).await?;
    Ok(())
}

pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            print!(
                "{}",
                toml::to_string_pretty(config).context("Failed to serialize config")?
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

pub fn handle_config_validate(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let result = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load_or_create(),
    };

    match (result, format) {
        (Ok(_), OutputFormat::Text) => println!("✓ Configuration is valid"),
        (Ok(_), OutputFormat::Json) => println!("{}", json!({"valid": true})),
        (Err(e), OutputFormat::Text) => {
            println!("✗ {}", e);
            return Err(e.into());
        }
        (Err(e), OutputFormat::Json) => {
            println!("{}", json!({"valid": false, "error": e.to_string()}));
            return Err(e.into());
        }
    }
    Ok(())
}

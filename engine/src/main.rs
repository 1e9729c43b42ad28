// fundrag
// Main entry point for the fundrag binary

use clap::Parser;
use fundrag_engine::cli::{Cli, Command, ConfigAction};
use fundrag_engine::config::Config;
use fundrag_engine::handlers::{
    handle_ask, handle_classify, handle_config_show, handle_config_validate, handle_serve,
    OutputFormat,
};
use fundrag_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Validation reports on the file instead of failing to start
    if let Command::Config {
        action: ConfigAction::Validate,
    } = &cli.command
    {
        init_telemetry();
        return handle_config_validate(cli.config.as_deref(), format);
    }

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // RUST_LOG > --log > core.log_level
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));
    tracing::debug!("fundrag v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Ask { question, previous } => {
            tracing::info!("Answering question");
            handle_ask(question, previous, &config, format).await
        }

        Command::Classify { question, previous } => {
            handle_classify(question, previous, &config, format).await
        }

        Command::Serve { bind } => handle_serve(&config, bind).await,

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Validate => handle_config_validate(cli.config.as_deref(), format),
        },
    }
}

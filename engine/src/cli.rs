//! CLI interface for fundrag
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fund research assistant
///
/// Routes each question to structured fund records, semantic fund search,
/// the macroeconomic outlook, or a combination, and answers with numbered
/// citations.
#[derive(Parser, Debug)]
#[command(name = "fundrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question, streaming progress and the answer
    Ask {
        /// The question
        question: String,

        /// Prior user turn, repeatable (oldest first)
        #[arg(long = "previous", value_name = "TEXT")]
        previous: Vec<String>,
    },

    /// Show which route a question would take, without fetching anything
    Classify {
        /// The question
        question: String,

        /// Prior user turn, repeatable (oldest first)
        #[arg(long = "previous", value_name = "TEXT")]
        previous: Vec<String>,
    },

    /// Run the HTTP server
    Serve {
        /// Override server.bind
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate,
}

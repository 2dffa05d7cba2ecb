//! CLI module for Undre.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Undre - Transcript Search and Question Suggestion
///
/// Ingest transcript documents, search them semantically, and generate
/// suggested questions from their content.
/// The name "Undre" comes from the Norwegian word for "wonder."
#[derive(Parser, Debug)]
#[command(name = "undre")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a transcript document (or a directory of them) and print the outcome ledger
    Ingest {
        /// Path to a .json transcript document or a directory of them
        path: String,
    },

    /// Search indexed transcript chunks
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Filter: episode number
        #[arg(short, long)]
        episode: Option<i64>,

        /// Filter: topic within the chunk topic list
        #[arg(short, long)]
        topic: Option<String>,

        /// Extract filters from the query text instead of using flags
        #[arg(long)]
        intent: bool,
    },

    /// Generate and print suggested questions
    Questions {
        /// Number of question sets to suggest
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Filter: topic the question sets must cover
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Start the HTTP API server with startup ingestion and the generation scheduler
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod documents;
mod ingest;
mod init;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "earnings")]
#[command(about = "Earnings-call transcript intake and analysis")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Start the HTTP API
    Serve {
        /// Address to bind: port, host, or host:port (defaults to the configured server address)
        bind: Option<String>,
    },

    /// Extract and store a transcript file
    Ingest {
        /// PDF or text file
        path: PathBuf,
        /// Media type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Analyze a stored document
    Analyze {
        /// Document ID
        document_id: String,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a stored document
    Show {
        /// Document ID
        document_id: String,
        /// Print the document as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent documents
    List {
        /// Maximum number of documents to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Ingest { path, mime } => {
            ingest::cmd_ingest(&settings, &path, mime.as_deref()).await
        }
        Commands::Analyze { document_id, json } => {
            analyze::cmd_analyze(&settings, &document_id, json).await
        }
        Commands::Show { document_id, json } => {
            documents::cmd_show(&settings, &document_id, json).await
        }
        Commands::List { limit } => documents::cmd_list(&settings, limit).await,
    }
}

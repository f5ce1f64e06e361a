//! Docent CLI
//!
//! Main entry point for the docent command-line tool.
//! Ingests local documents and answers questions from them, from web pages
//! they reference, or from general knowledge.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, IngestCommand, RemoveCommand, StatsCommand};
use docent_core::{config::AppConfig, logging, AppResult, StoreBackend};
use std::path::PathBuf;

/// Docent - answers grounded in your documents
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(about = "Answers grounded in your documents, the web pages they cite, or general knowledge", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCENT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Document store backend (sqlite, memory)
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Answer synthesizer provider (ollama, gemini)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Answer synthesizer model
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a file or directory into the document store
    Ingest(IngestCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive question session
    Chat(ChatCommand),

    /// Show document store statistics
    Stats(StatsCommand),

    /// Remove a document and its chunks
    Remove(RemoveCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Stats(_) => "stats",
            Commands::Remove(_) => "remove",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file decide which YAML is read, so they go in before loading
    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?;

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.store,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Store: {:?}", config.store.backend);
    tracing::debug!("LLM: {} / {}", config.llm.provider, config.llm.model);

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Remove(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

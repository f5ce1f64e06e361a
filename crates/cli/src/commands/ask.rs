//! Ask command handler.
//!
//! Answers one question through the routing pipeline.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{AskOutcome, KnowledgeBase};
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Never fall back to general knowledge
    #[arg(long)]
    pub no_extended_knowledge: bool,

    /// Ingest this file or directory first (useful with --store memory)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output as JSON, including the routing decision
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let kb = KnowledgeBase::open(config)?;
        if let Some(path) = &self.source {
            super::ingest::preload(&kb, path).await?;
        }

        let pipeline = kb.ask_pipeline().await?;
        let extended = config.extended_knowledge && !self.no_extended_knowledge;
        let outcome = pipeline.ask(&self.question, extended).await?;

        self.print(&outcome)
    }

    fn print(&self, outcome: &AskOutcome) -> AppResult<()> {
        if self.json {
            return super::print_json(outcome);
        }

        println!("{}", outcome.render());
        if let Some(decision) = outcome.decision() {
            for step in &decision.trace {
                tracing::debug!("route: {}", step);
            }
        }
        Ok(())
    }
}

//! Command handlers for the docent CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod remove;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use remove::RemoveCommand;
pub use stats::StatsCommand;

use docent_core::{AppError, AppResult};

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

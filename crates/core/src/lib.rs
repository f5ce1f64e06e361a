//! Docent Core Library
//!
//! This crate provides the foundational utilities shared by every Docent crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, ChunkingConfig, EmbeddingSettings, LlmSettings, RetrievalConfig, SessionConfig,
    StoreBackend, StoreConfig, SynthesisConfig, WebConfig,
};
pub use error::{AppError, AppResult};

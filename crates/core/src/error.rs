//! Error types for Docent.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! language model, embedding, storage, web fetch, and retrieval failures.

use thiserror::Error;

/// Unified error type for Docent.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration and credential errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Permanent language model errors (bad request, quota exhausted, empty answer)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Transient language model errors (overloaded, 5xx, timeout)
    #[error("LLM temporarily unavailable: {0}")]
    LlmUnavailable(String),

    /// Embedding capability errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Web fetch errors (never surfaced to the user)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Ingestion and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::LlmUnavailable(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

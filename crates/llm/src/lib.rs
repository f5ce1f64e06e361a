//! LLM integration crate for Docent.
//!
//! This crate provides a provider-agnostic abstraction over the language
//! model that synthesizes answers, plus the retry policy wrapped around it.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Gemini**: Google generative language API
//!
//! # Example
//! ```no_run
//! use docent_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient};
pub use retry::RetryPolicy;
pub use types::ProviderType;

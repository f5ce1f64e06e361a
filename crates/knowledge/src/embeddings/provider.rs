//! Embedding provider trait and factory.

use docent_core::{AppError, AppResult, EmbeddingSettings};
use std::sync::Arc;

use super::providers::{OllamaProvider, TrigramProvider};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// Returns `Ok(None)` for the `none` provider: chunks are stored without
/// vectors and retrieval falls back to keyword scoring.
pub fn create_provider(config: &EmbeddingSettings) -> AppResult<Option<Arc<dyn EmbeddingProvider>>> {
    match config.provider.as_str() {
        "trigram" => Ok(Some(Arc::new(TrigramProvider::new(config.dimensions)))),

        "ollama" => {
            let provider = OllamaProvider::new(
                config.endpoint.as_deref(),
                &config.model,
                config.dimensions,
            )?;
            Ok(Some(Arc::new(provider)))
        }

        "none" => Ok(None),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama, none",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let provider = create_provider(&EmbeddingSettings::default()).unwrap().unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_none_provider() {
        let config = EmbeddingSettings {
            provider: "none".to_string(),
            ..EmbeddingSettings::default()
        };
        assert!(create_provider(&config).unwrap().is_none());
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingSettings {
            provider: "unknown".to_string(),
            ..EmbeddingSettings::default()
        };

        let result = create_provider(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingSettings::default()).unwrap().unwrap();
        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}

//! Embedding capability boundary.
//!
//! An [`EmbeddingProvider`] turns an ordered batch of texts into one
//! fixed-dimension vector per text. [`embed_in_batches`] splits large inputs
//! into provider-sized batches and checks the order-preserving contract.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use docent_core::{AppError, AppResult};

/// Embed `texts` in batches of `batch_size`, preserving order.
///
/// Any batch failure fails the whole call; partial results are discarded.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned {} vectors for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dimensions()) {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned {} dimensions, expected {}",
                provider.provider_name(),
                bad.len(),
                provider.dimensions()
            )));
        }
        embeddings.extend(vectors);
    }

    tracing::debug!(
        "Generated {} embeddings of dimension {} using '{}'",
        embeddings.len(),
        provider.dimensions(),
        provider.model_name()
    );

    Ok(embeddings)
}

/// Error for a store whose vectors were written by a model of another dimension.
pub fn dimension_conflict(recorded: usize, provider: &dyn EmbeddingProvider) -> AppError {
    AppError::Config(format!(
        "Store holds {}-dimensional embeddings but '{}/{}' produces {}; \
         run `docent ingest --force-rebuild` to re-embed",
        recorded,
        provider.provider_name(),
        provider.model_name(),
        provider.dimensions()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn provider_name(&self) -> &str {
            "counting"
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            1
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let provider = CountingProvider::default();
        let texts: Vec<String> = (1..=5).map(|n| "x".repeat(n)).collect();

        let embeddings = embed_in_batches(&provider, &texts, 2).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            embeddings,
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]
        );
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let provider = CountingProvider::default();
        assert!(embed_in_batches(&provider, &[], 8).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_trigram_batches() {
        let provider = TrigramProvider::new(64);
        let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
        let embeddings = embed_in_batches(&provider, &texts, 1).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.len() == 64));
    }
}

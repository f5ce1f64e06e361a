//! Retrieval over the document store.
//!
//! Two interchangeable [`Retriever`] variants rank chunks for a query:
//! [`VectorRetriever`] embeds the query and asks the store for nearest
//! neighbours, [`KeywordRetriever`] scores lexical overlap. Which one runs is
//! decided once by [`select_retriever`] from what is available.

pub mod keyword;
pub mod vector;

pub use keyword::{keyword_score, KeywordRetriever};
pub use vector::VectorRetriever;

use crate::embeddings::{dimension_conflict, EmbeddingProvider};
use crate::store::DocumentStore;
use crate::types::RetrievalHit;
use async_trait::async_trait;
use docent_core::AppResult;
use std::sync::Arc;

/// Ranks stored chunks against a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short name for logs and decision traces ("vector", "keyword").
    fn name(&self) -> &str;

    /// Up to `k` hits scoring strictly above `threshold`, best first.
    async fn retrieve(&self, query: &str, threshold: f32, k: usize)
        -> AppResult<Vec<RetrievalHit>>;
}

/// Pick vector retrieval when an embedder is configured and the store holds
/// vectors, keyword retrieval otherwise.
///
/// Stored vectors of another dimension than the embedder's are a
/// configuration error.
pub async fn select_retriever(
    store: Arc<dyn DocumentStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> AppResult<Arc<dyn Retriever>> {
    if let Some(embedder) = embedder {
        if store.has_vectors().await? {
            if let Some(recorded) = store.stats().await?.dimension {
                if recorded != embedder.dimensions() {
                    return Err(dimension_conflict(recorded, embedder.as_ref()));
                }
            }
            tracing::debug!(
                "Using vector retrieval ({}/{})",
                embedder.provider_name(),
                embedder.model_name()
            );
            return Ok(Arc::new(VectorRetriever::new(store, embedder)));
        }
    }

    tracing::debug!("Using keyword retrieval ({} store)", store.backend_name());
    Ok(Arc::new(KeywordRetriever::new(store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::store::MemoryStore;
    use crate::types::NewChunk;

    #[tokio::test]
    async fn test_select_keyword_without_embedder() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let retriever = select_retriever(store, None).await.unwrap();
        assert_eq!(retriever.name(), "keyword");
    }

    #[tokio::test]
    async fn test_select_keyword_when_store_has_no_vectors() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(16));
        let retriever = select_retriever(store, Some(embedder)).await.unwrap();
        assert_eq!(retriever.name(), "keyword");
    }

    #[tokio::test]
    async fn test_select_vector_when_available() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .sync_document(
                "a",
                "a.md",
                "h",
                &[NewChunk {
                    id: "a_chunk_0".to_string(),
                    ordinal: 0,
                    content: "text".to_string(),
                    embedding: Some(vec![1.0; 16]),
                    metadata: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(16));
        let retriever = select_retriever(store.clone(), Some(embedder)).await.unwrap();
        assert_eq!(retriever.name(), "vector");

        // A model with another dimension cannot query these vectors
        let resized: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(8));
        let result = select_retriever(store, Some(resized)).await;
        assert!(matches!(result, Err(docent_core::AppError::Config(_))));
    }
}

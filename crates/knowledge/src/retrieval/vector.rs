//! Embedding-based retrieval.

use super::Retriever;
use crate::embeddings::EmbeddingProvider;
use crate::store::DocumentStore;
use crate::types::RetrievalHit;
use async_trait::async_trait;
use docent_core::AppResult;
use std::sync::Arc;

/// Embeds the query and delegates to [`DocumentStore::nearest`].
pub struct VectorRetriever {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn name(&self) -> &str {
        "vector"
    }

    async fn retrieve(
        &self,
        query: &str,
        threshold: f32,
        k: usize,
    ) -> AppResult<Vec<RetrievalHit>> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.store.nearest(&query_embedding, threshold, k).await?;

        if let Some(best) = hits.first() {
            tracing::debug!(
                "Vector search returned {} hits (best {:.3})",
                hits.len(),
                best.score
            );
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_id;
    use crate::embeddings::providers::TrigramProvider;
    use crate::store::MemoryStore;
    use crate::types::NewChunk;

    async fn seed(store: &dyn DocumentStore, embedder: &TrigramProvider, doc: &str, text: &str) {
        let embedding = embedder.embed(text).await.unwrap();
        store
            .sync_document(
                doc,
                doc,
                "h",
                &[NewChunk {
                    id: chunk_id(doc, 0),
                    ordinal: 0,
                    content: text.to_string(),
                    embedding: Some(embedding),
                    metadata: serde_json::json!({ "document_name": doc }),
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_identical_text_ranks_first() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(TrigramProvider::new(128));
        seed(store.as_ref(), &embedder, "rust.md", "Rust ownership and borrowing").await;
        seed(store.as_ref(), &embedder, "food.md", "Slow cooked tomato sauce").await;

        let retriever = VectorRetriever::new(store, embedder);
        let hits = retriever
            .retrieve("Rust ownership and borrowing", 0.0, 5)
            .await
            .unwrap();

        assert_eq!(hits[0].document_id, "rust.md");
        assert!((hits[0].score - 1.0).abs() < 1e-4);
    }
}

//! Lexical-overlap retrieval.
//!
//! Scores are the fraction of content words from the query that occur in the
//! chunk, plus a 0.3 bonus when the whole query appears verbatim, capped at 1.0.

use super::Retriever;
use crate::store::DocumentStore;
use crate::types::RetrievalHit;
use async_trait::async_trait;
use docent_core::AppResult;
use std::sync::Arc;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to", "for",
    "of", "as", "by", "from",
];

const PHRASE_BONUS: f32 = 0.3;

/// Lowercased query words longer than two characters, minus stop words.
fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Keyword relevance of `text` for `query`, in [0, 1].
///
/// A query with no content words scores 0 against everything.
pub fn keyword_score(query: &str, text: &str) -> f32 {
    let words = query_words(query);
    if words.is_empty() {
        return 0.0;
    }

    let haystack = text.to_lowercase();
    let matches = words.iter().filter(|w| haystack.contains(w.as_str())).count();
    let mut score = matches as f32 / words.len() as f32;

    if haystack.contains(query.to_lowercase().trim()) {
        score += PHRASE_BONUS;
    }

    score.min(1.0)
}

/// Scores every stored chunk; used when no vectors are available.
pub struct KeywordRetriever {
    store: Arc<dyn DocumentStore>,
}

impl KeywordRetriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(
        &self,
        query: &str,
        threshold: f32,
        k: usize,
    ) -> AppResult<Vec<RetrievalHit>> {
        let chunks = self.store.all_chunks().await?;

        let mut hits: Vec<RetrievalHit> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = keyword_score(query, &chunk.content);
                (score > threshold).then(|| RetrievalHit::from_chunk(chunk, score))
            })
            .collect();

        // Stable: equal scores keep (document id, ordinal) order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        tracing::debug!("Keyword search scored {} of {} chunks", hits.len(), chunks.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_id;
    use crate::store::MemoryStore;
    use crate::types::NewChunk;

    #[test]
    fn test_keyword_score() {
        // "rust" and "ownership" both match; the phrase does not
        let score = keyword_score("rust ownership", "Ownership is central to Rust.");
        assert!((score - 1.0).abs() < 1e-6);

        let half = keyword_score("rust pasta", "Rust is fast");
        assert!((half - 0.5).abs() < 1e-6);

        assert_eq!(keyword_score("the of a", "the of a"), 0.0);
        assert_eq!(keyword_score("tomato", "Rust is fast"), 0.0);
    }

    #[test]
    fn test_phrase_bonus_is_capped() {
        let score = keyword_score("borrow checker", "The borrow checker rejects this.");
        assert_eq!(score, 1.0);

        let partial = keyword_score("borrow checker rules", "the borrow checker");
        assert!((partial - (2.0 / 3.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_keep_store_order() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let chunks: Vec<NewChunk> = (0..3)
            .map(|i| NewChunk {
                id: chunk_id("doc", i),
                ordinal: i,
                content: format!("tokio runtime part {}", i),
                embedding: None,
                metadata: serde_json::json!({}),
            })
            .collect();
        store.sync_document("doc", "doc", "h", &chunks).await.unwrap();

        let retriever = KeywordRetriever::new(store);
        let hits = retriever.retrieve("tokio runtime", 0.0, 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "doc_chunk_0");
        assert_eq!(hits[1].chunk_id, "doc_chunk_1");
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .sync_document(
                "doc",
                "doc",
                "h",
                &[NewChunk {
                    id: chunk_id("doc", 0),
                    ordinal: 0,
                    content: "rust is fast".to_string(),
                    embedding: None,
                    metadata: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();

        let retriever = KeywordRetriever::new(store);
        assert!(retriever.retrieve("rust pasta", 0.5, 5).await.unwrap().is_empty());
        assert_eq!(retriever.retrieve("rust pasta", 0.4, 5).await.unwrap().len(), 1);
    }
}

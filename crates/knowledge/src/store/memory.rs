//! In-memory [`DocumentStore`] for ephemeral deployments and tests.
//!
//! All state sits behind one `RwLock`, so a chunk replacement is a single
//! write-locked step and readers never observe it half done. The lock is
//! never held across an `.await`.

use super::{check_dimension, check_query, make_stats, rank_nearest, DocumentStore};
use crate::types::{ChunkRecord, DocumentRecord, NewChunk, RetrievalHit, StoreStats};
use async_trait::async_trait;
use chrono::Utc;
use docent_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    documents: BTreeMap<String, DocumentRecord>,
    /// Chunks per document id, in ordinal order
    chunks: BTreeMap<String, Vec<ChunkRecord>>,
    dimension: Option<usize>,
}

impl State {
    fn upsert_document(&mut self, id: &str, name: &str, hash: &str) {
        let now = Utc::now();
        self.documents
            .entry(id.to_string())
            .and_modify(|doc| {
                doc.name = name.to_string();
                doc.hash = hash.to_string();
                doc.updated_at = now;
            })
            .or_insert_with(|| DocumentRecord {
                id: id.to_string(),
                name: name.to_string(),
                hash: hash.to_string(),
                chunk_count: 0,
                created_at: now,
                updated_at: now,
            });
    }

    /// The recorded dimension, unless `document_id` holds the only vectors.
    fn dimension_excluding(&self, document_id: &str) -> Option<usize> {
        let others_embedded = self
            .chunks
            .iter()
            .filter(|(id, _)| id.as_str() != document_id)
            .flat_map(|(_, chunks)| chunks)
            .any(|c| c.embedding.is_some());
        if others_embedded {
            self.dimension
        } else {
            None
        }
    }

    fn replace_chunks(&mut self, document_id: &str, chunks: &[NewChunk]) -> AppResult<u32> {
        if !self.documents.contains_key(document_id) {
            return Err(AppError::Store(format!(
                "Cannot replace chunks of unknown document '{}'",
                document_id
            )));
        }

        let dimension = check_dimension(self.dimension_excluding(document_id), chunks)?;

        let now = Utc::now();
        let mut records: Vec<ChunkRecord> = chunks
            .iter()
            .map(|chunk| ChunkRecord {
                id: chunk.id.clone(),
                document_id: document_id.to_string(),
                ordinal: chunk.ordinal,
                content: chunk.content.clone(),
                embedding: chunk.embedding.clone(),
                metadata: chunk.metadata.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();
        records.sort_by_key(|c| c.ordinal);

        let count = records.len() as u32;
        self.dimension = dimension;
        self.chunks.insert(document_id.to_string(), records);
        if let Some(doc) = self.documents.get_mut(document_id) {
            doc.chunk_count = count;
            doc.updated_at = now;
        }

        Ok(count)
    }
}

/// Ephemeral store; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| AppError::Store("In-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| AppError::Store("In-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn upsert_document(&self, id: &str, name: &str, hash: &str) -> AppResult<()> {
        self.write()?.upsert_document(id, name, hash);
        Ok(())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[NewChunk]) -> AppResult<u32> {
        self.write()?.replace_chunks(document_id, chunks)
    }

    async fn sync_document(
        &self,
        id: &str,
        name: &str,
        hash: &str,
        chunks: &[NewChunk],
    ) -> AppResult<u32> {
        let mut state = self.write()?;
        // Validate before touching metadata so a failed sync leaves no trace
        check_dimension(state.dimension_excluding(id), chunks)?;
        state.upsert_document(id, name, hash);
        state.replace_chunks(id, chunks)
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let mut state = self.write()?;
        state.chunks.remove(id);
        let existed = state.documents.remove(id).is_some();
        if state.dimension_excluding(id).is_none() {
            state.dimension = None;
        }
        Ok(existed)
    }

    async fn nearest(
        &self,
        query: &[f32],
        threshold: f32,
        k: usize,
    ) -> AppResult<Vec<RetrievalHit>> {
        let state = self.read()?;
        check_query(query, threshold, state.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        Ok(rank_nearest(
            state.chunks.values().flatten(),
            query,
            threshold,
            k,
        ))
    }

    async fn all_document_hashes(&self) -> AppResult<HashMap<String, String>> {
        Ok(self
            .read()?
            .documents
            .values()
            .map(|doc| (doc.id.clone(), doc.hash.clone()))
            .collect())
    }

    async fn get_document(&self, id: &str) -> AppResult<Option<DocumentRecord>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn list_documents(&self) -> AppResult<Vec<DocumentRecord>> {
        Ok(self.read()?.documents.values().cloned().collect())
    }

    async fn all_chunks(&self) -> AppResult<Vec<ChunkRecord>> {
        Ok(self.read()?.chunks.values().flatten().cloned().collect())
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let state = self.read()?;
        let chunks: usize = state.chunks.values().map(Vec::len).sum();
        Ok(make_stats(
            state.documents.len() as u32,
            chunks as u32,
            state.dimension,
        ))
    }

    async fn has_vectors(&self) -> AppResult<bool> {
        Ok(self
            .read()?
            .chunks
            .values()
            .flatten()
            .any(|c| c.embedding.is_some()))
    }

    async fn clear_vectors(&self) -> AppResult<u32> {
        let mut state = self.write()?;
        for chunk in state.chunks.values_mut().flatten() {
            chunk.embedding = None;
        }
        for doc in state.documents.values_mut() {
            doc.hash.clear();
        }
        state.dimension = None;
        Ok(state.documents.len() as u32)
    }

    async fn reset(&self) -> AppResult<()> {
        *self.write()? = State::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, ordinal: u32, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            id: crate::chunker::chunk_id(doc, ordinal),
            ordinal,
            content: format!("{} chunk {}", doc, ordinal),
            embedding: Some(embedding),
            metadata: serde_json::json!({ "document_name": doc }),
        }
    }

    #[tokio::test]
    async fn test_own_vector_ranks_first() {
        let store = MemoryStore::new();
        store
            .sync_document(
                "a",
                "a.md",
                "h",
                &[chunk("a", 0, vec![1.0, 0.0]), chunk("a", 1, vec![0.6, 0.8])],
            )
            .await
            .unwrap();

        let hits = store.nearest(&[0.6, 0.8], 0.0, 5).await.unwrap();
        assert_eq!(hits[0].chunk_id, "a_chunk_1");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_threshold_is_strict_and_filters() {
        let store = MemoryStore::new();
        // cos = 0.5 against the query below
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, vec![0.5, 0.866_025_4])])
            .await
            .unwrap();

        assert!(store.nearest(&[1.0, 0.0], 0.9, 5).await.unwrap().is_empty());
        assert_eq!(store.nearest(&[1.0, 0.0], 0.4, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_with_bad_dimension_writes_nothing() {
        let store = MemoryStore::new();
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let result = store
            .sync_document("b", "b.md", "h", &[chunk("b", 0, vec![1.0])])
            .await;
        assert!(result.is_err());
        assert!(store.get_document("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let store = MemoryStore::new();
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .sync_document("b", "b.md", "h", &[chunk("b", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert!(store.delete_document("a").await.unwrap());
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.documents, stats.chunks), (1, 1));

        store.reset().await.unwrap();
        assert_eq!(store.stats().await.unwrap().documents, 0);
        assert!(!store.has_vectors().await.unwrap());
    }

    #[tokio::test]
    async fn test_dimension_released_with_last_vectors() {
        let store = MemoryStore::new();
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        // The only embedded document may change dimension in place
        store
            .sync_document("a", "a.md", "h2", &[chunk("a", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().dimension, Some(3));

        assert!(store.delete_document("a").await.unwrap());
        assert_eq!(store.stats().await.unwrap().dimension, None);

        store
            .sync_document("b", "b.md", "h", &[chunk("b", 0, vec![1.0; 4])])
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().dimension, Some(4));
        assert_eq!(store.nearest(&[1.0; 4], 0.5, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_vectors_keeps_chunks_and_blanks_hashes() {
        let store = MemoryStore::new();
        store
            .sync_document("a", "a.md", "h", &[chunk("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.clear_vectors().await.unwrap(), 1);
        assert!(!store.has_vectors().await.unwrap());
        assert_eq!(store.all_chunks().await.unwrap().len(), 1);
        assert_eq!(store.all_document_hashes().await.unwrap()["a"], "");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.dimension, None);
        store
            .sync_document("b", "b.md", "h", &[chunk("b", 0, vec![1.0; 3])])
            .await
            .unwrap();
    }
}

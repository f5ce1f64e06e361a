//! Document store abstraction.
//!
//! The [`DocumentStore`] trait owns persistence of document metadata and
//! chunks. Two backends are provided, selected by configuration through
//! [`open_store`]:
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | `sqlite` | [`SqliteStore`] | Persistent; one connection per operation, WAL, cascading deletes |
//! | `memory` | [`MemoryStore`] | Ephemeral; a single `RwLock` over all state |
//!
//! Every multi-step write (`replace_chunks`, `sync_document`) is atomic:
//! readers see either the old chunk set or the new one, never a mix.
//!
//! The embedding dimension is recorded with the first vector and released
//! again once no stored chunk carries one.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{ChunkRecord, DocumentRecord, NewChunk, RetrievalHit, StoreStats};
use async_trait::async_trait;
use docent_core::{AppError, AppResult, StoreBackend, StoreConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Abstract storage backend for documents and chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs and stats ("sqlite", "memory").
    fn backend_name(&self) -> &str;

    /// Insert or update document metadata and refresh `updated_at`.
    async fn upsert_document(&self, id: &str, name: &str, hash: &str) -> AppResult<()>;

    /// Atomically replace every chunk of an existing document.
    ///
    /// Returns the new chunk count.
    async fn replace_chunks(&self, document_id: &str, chunks: &[NewChunk]) -> AppResult<u32>;

    /// Upsert metadata and replace chunks in one atomic step.
    async fn sync_document(
        &self,
        id: &str,
        name: &str,
        hash: &str,
        chunks: &[NewChunk],
    ) -> AppResult<u32>;

    /// Delete a document and its chunks. Returns whether it existed.
    async fn delete_document(&self, id: &str) -> AppResult<bool>;

    /// Up to `k` chunks with cosine similarity strictly above `threshold`, best first.
    async fn nearest(&self, query: &[f32], threshold: f32, k: usize)
        -> AppResult<Vec<RetrievalHit>>;

    /// `id -> hash` for every stored document, without loading chunks.
    async fn all_document_hashes(&self) -> AppResult<HashMap<String, String>>;

    async fn get_document(&self, id: &str) -> AppResult<Option<DocumentRecord>>;

    async fn list_documents(&self) -> AppResult<Vec<DocumentRecord>>;

    /// Every chunk, ordered by document id then ordinal.
    async fn all_chunks(&self) -> AppResult<Vec<ChunkRecord>>;

    async fn stats(&self) -> AppResult<StoreStats>;

    /// Whether any stored chunk carries an embedding.
    async fn has_vectors(&self) -> AppResult<bool>;

    /// Drop every stored embedding and the recorded dimension.
    ///
    /// Chunks stay readable, but document hashes are blanked so the next
    /// ingest re-embeds every document. Returns the number of documents.
    async fn clear_vectors(&self) -> AppResult<u32>;

    /// Delete all data, including the recorded dimension.
    async fn reset(&self) -> AppResult<()>;
}

/// Open the store selected by configuration.
pub fn open_store(config: &StoreConfig, workspace: &Path) -> AppResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = if config.path.is_absolute() {
                config.path.clone()
            } else {
                workspace.join(&config.path)
            };
            tracing::debug!("Opening SQLite store at {:?}", path);
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        StoreBackend::Memory => {
            tracing::debug!("Using ephemeral in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Convert embedding vector to little-endian bytes for storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
pub fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store(format!(
            "Invalid embedding bytes length: {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Check a chunk batch against the recorded dimension.
///
/// Returns the dimension to record afterwards.
pub(crate) fn check_dimension(
    recorded: Option<usize>,
    chunks: &[NewChunk],
) -> AppResult<Option<usize>> {
    let mut dimension = recorded;
    for chunk in chunks {
        if let Some(embedding) = &chunk.embedding {
            match dimension {
                Some(expected) if expected != embedding.len() => {
                    return Err(AppError::Store(format!(
                        "Dimension mismatch for chunk {}: expected {}, got {}",
                        chunk.id,
                        expected,
                        embedding.len()
                    )));
                }
                Some(_) => {}
                None if embedding.is_empty() => {
                    return Err(AppError::Store(format!("Empty embedding for chunk {}", chunk.id)));
                }
                None => dimension = Some(embedding.len()),
            }
        }
    }
    Ok(dimension)
}

/// Validate the arguments of a similarity query.
pub(crate) fn check_query(
    query: &[f32],
    threshold: f32,
    dimension: Option<usize>,
) -> AppResult<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::Store(format!(
            "Similarity threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    if let Some(expected) = dimension {
        if query.len() != expected {
            return Err(AppError::Store(format!(
                "Query dimension mismatch: expected {}, got {}",
                expected,
                query.len()
            )));
        }
    }
    Ok(())
}

/// Score chunks against `query`, keep those above `threshold`, best `k` first.
///
/// Ties keep input order, so callers pass chunks in (document id, ordinal) order.
pub(crate) fn rank_nearest<'a>(
    chunks: impl Iterator<Item = &'a ChunkRecord>,
    query: &[f32],
    threshold: f32,
    k: usize,
) -> Vec<RetrievalHit> {
    let mut hits: Vec<RetrievalHit> = chunks
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_ref()?;
            let score = cosine_similarity(query, embedding);
            (score > threshold).then(|| RetrievalHit::from_chunk(chunk, score))
        })
        .collect();

    // sort_by is stable
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

/// Build stats from raw counts.
pub(crate) fn make_stats(documents: u32, chunks: u32, dimension: Option<usize>) -> StoreStats {
    StoreStats {
        documents,
        chunks,
        avg_chunks_per_doc: if documents == 0 {
            0.0
        } else {
            chunks as f32 / documents as f32
        },
        dimension,
    }
}

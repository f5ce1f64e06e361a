//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document as enumerated by a [`DocumentSource`](crate::source::DocumentSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Stable identifier (e.g. path relative to the source root)
    pub id: String,

    /// Display name used in attribution
    pub name: String,

    /// Raw extracted text (normalized before hashing and chunking)
    pub content: String,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Persisted per-document metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,

    /// Digest of the normalized full text
    pub hash: String,

    /// Number of chunks currently stored for this document
    pub chunk_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-chunk metadata stored alongside the chunk text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub document_name: String,
    pub chunk_index: u32,

    /// sha256 of the window text
    pub text_hash: String,

    /// Character offsets of the window in the normalized document
    pub char_start: usize,
    pub char_end: usize,
}

/// A chunk ready to be written by `replace_chunks`.
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Deterministic identifier: document id + ordinal
    pub id: String,
    pub ordinal: u32,
    pub content: String,

    /// `None` when no embedding capability is configured
    pub embedding: Option<Vec<f32>>,

    pub metadata: serde_json::Value,
}

/// A persisted chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub ordinal: u32,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default)]
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Document display name from the chunk metadata, falling back to the id.
    pub fn document_name(&self) -> String {
        self.metadata
            .get("document_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.document_id.clone())
    }
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,

    /// Relevance in [0, 1] (cosine similarity or keyword score)
    pub score: f32,

    pub metadata: serde_json::Value,
}

impl RetrievalHit {
    pub fn from_chunk(chunk: &ChunkRecord, score: f32) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            content: chunk.content.clone(),
            score,
            metadata: chunk.metadata.clone(),
        }
    }

    pub fn document_name(&self) -> String {
        self.metadata
            .get("document_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.document_id.clone())
    }
}

/// Options for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Reprocess documents whose hash is unchanged
    pub force_rebuild: bool,

    /// Delete stored documents missing from the current listing
    pub prune_removed: bool,

    /// Documents processed in parallel
    pub concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            prune_removed: true,
            concurrency: 4,
        }
    }
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub new: u32,
    pub changed: u32,
    pub unchanged: u32,
    pub removed: u32,
    pub failed: u32,

    /// Chunks written across all processed documents
    pub chunks_written: u32,

    pub duration_secs: f64,
}

/// Statistics for the document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStats {
    pub documents: u32,
    pub chunks: u32,
    pub avg_chunks_per_doc: f32,

    /// Embedding dimension, once the first vector has been stored
    pub dimension: Option<usize>,
}

//! Incremental ingestion: list → detect changes → chunk → embed → store.
//!
//! Each document commits through a single atomic `sync_document`, so a
//! failure anywhere before the commit leaves its previous stored state
//! untouched and it is picked up again on the next run.

use crate::change::{ChangeKind, ChangePlan};
use crate::chunker::{calculate_hash, chunk_id, normalize_text, Chunker};
use crate::embeddings::{dimension_conflict, embed_in_batches, EmbeddingProvider};
use crate::source::DocumentSource;
use crate::store::DocumentStore;
use crate::types::{ChunkMetadata, IngestOptions, IngestReport, NewChunk};
use docent_core::AppResult;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A listed document after normalization.
#[derive(Debug, Clone)]
struct PreparedDocument {
    id: String,
    name: String,
    text: String,
    hash: String,
}

/// Drives a [`DocumentSource`] into a [`DocumentStore`].
pub struct IngestPipeline {
    store: Arc<dyn DocumentStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Chunker,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        chunker: Chunker,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(
        &self,
        source: &dyn DocumentSource,
        options: &IngestOptions,
    ) -> AppResult<IngestReport> {
        let start = Instant::now();
        info!("Starting ingestion from {}", source.describe());

        if let Some(embedder) = &self.embedder {
            if let Some(recorded) = self.store.stats().await?.dimension {
                if recorded != embedder.dimensions() {
                    if !options.force_rebuild {
                        return Err(dimension_conflict(recorded, embedder.as_ref()));
                    }
                    warn!(
                        "Embedding dimension changed from {} to {}, discarding stored vectors",
                        recorded,
                        embedder.dimensions()
                    );
                    self.store.clear_vectors().await?;
                }
            }
        }

        let documents = prepare(source.list()?);
        let current: Vec<(String, String)> = documents
            .iter()
            .map(|d| (d.id.clone(), d.hash.clone()))
            .collect();

        let stored = self.store.all_document_hashes().await?;
        let plan = ChangePlan::build(&stored, &current).within(source.scope().as_deref());

        let mut report = IngestReport {
            unchanged: plan.count(ChangeKind::Unchanged) as u32,
            ..IngestReport::default()
        };

        let work: Vec<(&PreparedDocument, ChangeKind)> = documents
            .iter()
            .zip(plan.listed.iter().map(|(_, kind)| *kind))
            .filter(|(_, kind)| kind.needs_processing(options.force_rebuild))
            .collect();

        debug!(
            "{} listed, {} to process, {} removed",
            documents.len(),
            work.len(),
            plan.removed.len()
        );

        let results: Vec<(&PreparedDocument, ChangeKind, AppResult<u32>)> = stream::iter(work)
            .map(|(doc, kind)| async move { (doc, kind, self.process(doc).await) })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        for (doc, kind, result) in results {
            match result {
                Ok(count) => {
                    report.chunks_written += count;
                    match kind {
                        ChangeKind::New => report.new += 1,
                        ChangeKind::Changed => report.changed += 1,
                        _ => {}
                    }
                }
                Err(e) => {
                    warn!("Failed to ingest {}: {}", doc.id, e);
                    report.failed += 1;
                }
            }
        }

        if options.prune_removed {
            for id in &plan.removed {
                match self.store.delete_document(id).await {
                    Ok(_) => {
                        debug!("Removed {}", id);
                        report.removed += 1;
                    }
                    Err(e) => {
                        warn!("Failed to remove {}: {}", id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        info!(
            "Ingestion complete: {} new, {} changed, {} unchanged, {} removed, {} failed, {} chunks in {:.2}s",
            report.new,
            report.changed,
            report.unchanged,
            report.removed,
            report.failed,
            report.chunks_written,
            report.duration_secs
        );

        Ok(report)
    }

    /// Chunk, embed and commit one document. Nothing is written on error.
    async fn process(&self, doc: &PreparedDocument) -> AppResult<u32> {
        let mut chunks = self.build_chunks(&doc.id, &doc.name, &doc.text);

        if let Some(embedder) = &self.embedder {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = embed_in_batches(embedder.as_ref(), &texts, self.batch_size).await?;
            for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }

        let count = self
            .store
            .sync_document(&doc.id, &doc.name, &doc.hash, &chunks)
            .await?;
        debug!("Stored {} chunks for {}", count, doc.id);
        Ok(count)
    }

    /// Chunks of already-normalized text, without embeddings.
    pub fn build_chunks(&self, document_id: &str, document_name: &str, text: &str) -> Vec<NewChunk> {
        self.chunker
            .windows(text)
            .map(|window| {
                let metadata = ChunkMetadata {
                    document_name: document_name.to_string(),
                    chunk_index: window.ordinal,
                    text_hash: calculate_hash(window.text),
                    char_start: window.char_start,
                    char_end: window.char_end,
                };
                NewChunk {
                    id: chunk_id(document_id, window.ordinal),
                    ordinal: window.ordinal,
                    content: window.text.to_string(),
                    embedding: None,
                    metadata: serde_json::to_value(&metadata).unwrap_or_default(),
                }
            })
            .collect()
    }
}

/// Normalize and hash each listed document; later duplicates of an id are dropped.
fn prepare(listed: Vec<crate::types::SourceDocument>) -> Vec<PreparedDocument> {
    let mut seen = HashSet::new();
    listed
        .into_iter()
        .filter_map(|doc| {
            if !seen.insert(doc.id.clone()) {
                warn!("Duplicate document id {}, keeping the first", doc.id);
                return None;
            }
            let text = normalize_text(&doc.content);
            let hash = calculate_hash(&text);
            Some(PreparedDocument {
                id: doc.id,
                name: doc.name,
                text,
                hash,
            })
        })
        .collect()
}

//! Test doubles implementing the crate's capability traits.

use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::rag::{AnswerSynthesizer, AssembledContext, SourceKind};
use crate::retrieval::Retriever;
use crate::types::RetrievalHit;
use crate::web::{ContentFetcher, WebExcerpt};
use async_trait::async_trait;
use docent_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub fn hit(document: &str, ordinal: u32, content: &str, score: f32) -> RetrievalHit {
    RetrievalHit {
        chunk_id: crate::chunker::chunk_id(document, ordinal),
        document_id: document.to_string(),
        content: content.to_string(),
        score,
        metadata: serde_json::json!({ "document_name": document }),
    }
}

/// Returns canned hits, honouring threshold and limit.
pub struct FixedRetriever {
    pub hits: Vec<RetrievalHit>,
}

#[async_trait]
impl Retriever for FixedRetriever {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn retrieve(&self, _query: &str, threshold: f32, k: usize) -> AppResult<Vec<RetrievalHit>> {
        Ok(self
            .hits
            .iter()
            .filter(|h| h.score > threshold)
            .take(k)
            .cloned()
            .collect())
    }
}

/// Serves known URLs, fails the rest, and records every request.
#[derive(Default)]
pub struct MapFetcher {
    pages: HashMap<String, String>,
    pub requested: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        let mut urls = self.requested.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

#[async_trait]
impl ContentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> AppResult<WebExcerpt> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(content) => Ok(WebExcerpt {
                url: url.to_string(),
                title: format!("Title of {}", url),
                content: content.clone(),
            }),
            None => Err(AppError::Fetch(format!("timeout fetching {}", url))),
        }
    }
}

/// Records what it was asked and answers with a fixed string.
#[derive(Default)]
pub struct RecordingSynthesizer {
    pub calls: AtomicU32,
    pub last: Mutex<Option<(AssembledContext, Vec<SourceKind>)>>,
}

impl RecordingSynthesizer {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> AssembledContext {
        self.last.lock().unwrap().clone().unwrap().0
    }

    pub fn last_sources(&self) -> Vec<SourceKind> {
        self.last.lock().unwrap().clone().unwrap().1
    }
}

#[async_trait]
impl AnswerSynthesizer for RecordingSynthesizer {
    async fn synthesize(
        &self,
        _question: &str,
        context: &AssembledContext,
        sources: &[SourceKind],
    ) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((context.clone(), sources.to_vec()));
        Ok("Synthesized answer.".to_string())
    }
}

/// Trigram embeddings that fail for any text containing `POISON`.
#[derive(Debug)]
pub struct PoisonableEmbedder {
    inner: TrigramProvider,
}

impl PoisonableEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: TrigramProvider::new(dimensions),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for PoisonableEmbedder {
    fn provider_name(&self) -> &str {
        "poisonable"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("POISON")) {
            return Err(AppError::Embedding("model unreachable".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

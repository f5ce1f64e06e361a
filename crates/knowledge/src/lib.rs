//! Knowledge engine for Docent.
//!
//! Incremental document ingestion into a vector-capable store, plus hybrid
//! retrieval and routing that decides per question whether to answer from
//! documents, fetched web pages or general knowledge.
//!
//! [`KnowledgeBase`] wires the pieces together from an [`AppConfig`]; the
//! individual components are public for embedding and testing.

pub mod change;
pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod parser;
pub mod rag;
pub mod retrieval;
pub mod session;
pub mod source;
pub mod store;
pub mod types;
pub mod web;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use change::{ChangeKind, ChangePlan};
pub use chunker::Chunker;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::IngestPipeline;
pub use rag::{AnswerSynthesizer, AskOutcome, AskPipeline, AskResponse, RoutingDecision, SourceKind};
pub use retrieval::{select_retriever, Retriever};
pub use session::{SessionInfo, SessionManager};
pub use source::{DocumentSource, FsSource, StaticSource};
pub use store::{open_store, DocumentStore};
pub use types::{
    DocumentRecord, IngestOptions, IngestReport, RetrievalHit, SourceDocument, StoreStats,
};
pub use web::{ContentFetcher, HttpFetcher};

use docent_core::{AppConfig, AppResult, StoreBackend};
use docent_llm::{create_client, RetryPolicy};
use rag::{LlmSynthesizer, Router};
use std::sync::Arc;

/// Store and embedder opened from configuration.
pub struct KnowledgeBase {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl KnowledgeBase {
    /// Open the configured store and embedding provider.
    ///
    /// The in-memory backend runs keyword-only: nothing it holds outlives
    /// the process, so vectors would be recomputed on every start.
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        if config.store.backend == StoreBackend::Sqlite {
            config.ensure_docent_dir()?;
        }
        let store = open_store(&config.store, &config.workspace)?;

        let embedder = match config.store.backend {
            StoreBackend::Memory => None,
            StoreBackend::Sqlite => create_provider(&config.embedding)?,
        };

        Ok(Self::with_parts(config.clone(), store, embedder))
    }

    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn ingest_pipeline(&self) -> AppResult<IngestPipeline> {
        Ok(IngestPipeline::new(
            self.store.clone(),
            self.embedder.clone(),
            Chunker::from_config(&self.config.chunking)?,
            self.config.embedding.batch_size,
        ))
    }

    pub async fn ingest(
        &self,
        source: &dyn DocumentSource,
        options: &IngestOptions,
    ) -> AppResult<IngestReport> {
        self.ingest_pipeline()?.run(source, options).await
    }

    /// Answering pipeline over explicit synthesizer and fetcher.
    pub async fn ask_pipeline_with(
        &self,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        fetcher: Option<Arc<dyn ContentFetcher>>,
    ) -> AppResult<AskPipeline> {
        let retriever = select_retriever(self.store.clone(), self.embedder.clone()).await?;
        let router = Router::new(
            retriever,
            fetcher,
            self.config.retrieval.clone(),
            self.config.web.clone(),
        )?;
        Ok(AskPipeline::new(router, synthesizer))
    }

    /// Answering pipeline using the configured language model and web fetcher.
    pub async fn ask_pipeline(&self) -> AppResult<AskPipeline> {
        let api_key = self.config.resolve_api_key();
        let client = create_client(&self.config.llm, api_key.as_deref())?;
        let synthesizer = Arc::new(LlmSynthesizer::new(
            client,
            self.config.llm.model.as_str(),
            RetryPolicy::from(&self.config.synthesis),
        )?);

        let fetcher: Option<Arc<dyn ContentFetcher>> = if self.config.web.enabled {
            Some(Arc::new(HttpFetcher::new(&self.config.web)?))
        } else {
            None
        };

        self.ask_pipeline_with(synthesizer, fetcher).await
    }

    pub async fn stats(&self) -> AppResult<StoreStats> {
        self.store.stats().await
    }

    pub async fn list_documents(&self) -> AppResult<Vec<DocumentRecord>> {
        self.store.list_documents().await
    }

    /// Delete one document and its chunks. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> AppResult<bool> {
        let removed = self.store.delete_document(id).await?;
        if removed {
            tracing::info!("Removed document {}", id);
        }
        Ok(removed)
    }
}

//! Routing decision engine.
//!
//! Per question, in fixed order:
//! 1. retrieve at the discovery threshold and take the best score;
//! 2. activate documents when the best score reaches the answer threshold;
//! 3. fetch URLs from the question and from discovery hits, activating web
//!    content on any successful fetch;
//! 4. with neither active, fall back to general knowledge if allowed;
//! 5. assemble the budgeted context and derive attribution labels.
//!
//! Synthesis (step 6) is left to the caller.

use super::context::AssembledContext;
use super::types::{attributed_sources, RoutingDecision, SourceKind};
use crate::retrieval::Retriever;
use crate::types::RetrievalHit;
use crate::web::{fetch_all, ContentFetcher, UrlExtractor, WebExcerpt};
use docent_core::{AppResult, RetrievalConfig, WebConfig};
use std::sync::Arc;
use tracing::{debug, info};

/// Decides which sources answer a question and assembles their context.
pub struct Router {
    retriever: Arc<dyn Retriever>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    urls: UrlExtractor,
    retrieval: RetrievalConfig,
    web: WebConfig,
}

impl Router {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        fetcher: Option<Arc<dyn ContentFetcher>>,
        retrieval: RetrievalConfig,
        web: WebConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            retriever,
            fetcher,
            urls: UrlExtractor::new()?,
            retrieval,
            web,
        })
    }

    pub async fn route(
        &self,
        question: &str,
        extended_knowledge: bool,
    ) -> AppResult<RoutingDecision> {
        let mut trace = Vec::new();
        let cfg = &self.retrieval;

        // 1. Retrieval
        let hits = self
            .retriever
            .retrieve(question, cfg.discovery_threshold, cfg.top_k)
            .await?;
        let best_score = hits.first().map(|h| h.score).unwrap_or(0.0);
        trace.push(format!(
            "retrieve: {} hits above {:.2} via {} (best {:.3})",
            hits.len(),
            cfg.discovery_threshold,
            self.retriever.name(),
            best_score
        ));

        // 2. Documents
        let documents_active = !hits.is_empty() && best_score >= cfg.answer_threshold;
        let answer_hits: Vec<RetrievalHit> = if documents_active {
            hits.iter()
                .filter(|h| h.score >= cfg.answer_threshold)
                .take(cfg.max_context_chunks)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        trace.push(format!(
            "documents: {} (threshold {:.2}, {} chunks)",
            if documents_active { "active" } else { "inactive" },
            cfg.answer_threshold,
            answer_hits.len()
        ));

        // 3. Web
        let (query_pages, document_pages) = self
            .fetch_web(question, &hits, documents_active, &mut trace)
            .await;
        let web_active = !query_pages.is_empty() || !document_pages.is_empty();

        // 4. Fallback
        let mut active = Vec::new();
        if documents_active {
            active.push(SourceKind::Documents);
        }
        if web_active {
            active.push(SourceKind::Web);
        }
        if active.is_empty() {
            if extended_knowledge {
                active.push(SourceKind::GeneralKnowledge);
                trace.push("fallback: general knowledge".to_string());
            } else {
                trace.push("fallback: disabled, no relevant information".to_string());
            }
        }

        // 5. Context
        let context = AssembledContext::assemble(
            &answer_hits,
            &query_pages,
            &document_pages,
            cfg.context_budget_chars,
        );
        let labels: Vec<String> = attributed_sources(&active, &context)
            .iter()
            .map(|kind| kind.label().to_string())
            .collect();
        trace.push(format!(
            "context: {} items, {} dropped, labels [{}]",
            context.items.len(),
            context.dropped,
            labels.join(", ")
        ));

        info!(
            "Routed question: sources [{}], best score {:.3}",
            active.iter().map(SourceKind::as_str).collect::<Vec<_>>().join(", "),
            best_score
        );

        Ok(RoutingDecision {
            active,
            labels,
            context,
            retriever: self.retriever.name().to_string(),
            best_score,
            trace,
        })
    }

    /// Fetch pages for URLs in the question and in discovery hits.
    async fn fetch_web(
        &self,
        question: &str,
        hits: &[RetrievalHit],
        documents_active: bool,
        trace: &mut Vec<String>,
    ) -> (Vec<WebExcerpt>, Vec<WebExcerpt>) {
        let fetcher = match (&self.fetcher, self.web.enabled) {
            (Some(fetcher), true) => fetcher,
            _ => {
                trace.push("web: disabled".to_string());
                return (Vec::new(), Vec::new());
            }
        };

        let query_urls = self.urls.extract(question, self.web.max_query_urls);

        let discovered: Vec<String> = if documents_active || self.retrieval.discover_when_inactive {
            let cap = self.web.max_discovered_urls + query_urls.len();
            self.urls
                .extract_all(hits.iter().map(|h| h.content.as_str()), cap)
                .into_iter()
                .filter(|url| !query_urls.contains(url))
                .take(self.web.max_discovered_urls)
                .collect()
        } else {
            Vec::new()
        };

        if query_urls.is_empty() && discovered.is_empty() {
            trace.push("web: no URLs".to_string());
            return (Vec::new(), Vec::new());
        }

        debug!(
            "Fetching {} question URLs and {} discovered URLs",
            query_urls.len(),
            discovered.len()
        );

        let (query_pages, document_pages) = tokio::join!(
            fetch_all(fetcher.as_ref(), &query_urls),
            fetch_all(fetcher.as_ref(), &discovered)
        );

        trace.push(format!(
            "web: {}/{} question URLs, {}/{} discovered URLs fetched",
            query_pages.len(),
            query_urls.len(),
            document_pages.len(),
            discovered.len()
        ));

        (query_pages, document_pages)
    }
}

//! Budgeted context assembly.
//!
//! Items are laid out as document chunks (relevance order), then pages from
//! URLs in the question, then pages discovered in documents. When the total
//! exceeds the character budget, items are dropped from the tail; a lone
//! first item that is itself too long is cut to fit.

use super::types::{SourceKind, WebOrigin};
use crate::types::RetrievalHit;
use crate::web::WebExcerpt;
use serde::Serialize;

/// One unit of context handed to the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContextItem {
    Document {
        document_name: String,
        chunk_id: String,
        score: f32,
        content: String,
    },
    Web {
        origin: WebOrigin,
        url: String,
        title: String,
        content: String,
    },
}

impl ContextItem {
    pub fn from_hit(hit: &RetrievalHit) -> Self {
        Self::Document {
            document_name: hit.document_name(),
            chunk_id: hit.chunk_id.clone(),
            score: hit.score,
            content: hit.content.clone(),
        }
    }

    pub fn from_excerpt(excerpt: &WebExcerpt, origin: WebOrigin) -> Self {
        Self::Web {
            origin,
            url: excerpt.url.clone(),
            title: excerpt.title.clone(),
            content: excerpt.content.clone(),
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Self::Document { .. } => SourceKind::Documents,
            Self::Web { .. } => SourceKind::Web,
        }
    }

    /// Text as it appears in the prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Document { content, .. } => content.clone(),
            Self::Web {
                url,
                title,
                content,
                ..
            } => format!("URL: {}\nTitle: {}\nContent: {}", url, title, content),
        }
    }

    fn rendered_len(&self) -> usize {
        self.render().chars().count()
    }

    fn content_mut(&mut self) -> &mut String {
        match self {
            Self::Document { content, .. } | Self::Web { content, .. } => content,
        }
    }
}

/// Ordered context items within the budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub items: Vec<ContextItem>,

    /// Items dropped to respect the budget
    pub dropped: usize,
}

impl AssembledContext {
    /// Lay out `docs`, `query_pages` and `document_pages` within `budget_chars`.
    pub fn assemble(
        docs: &[RetrievalHit],
        query_pages: &[WebExcerpt],
        document_pages: &[WebExcerpt],
        budget_chars: usize,
    ) -> Self {
        let candidates: Vec<ContextItem> = docs
            .iter()
            .map(ContextItem::from_hit)
            .chain(
                query_pages
                    .iter()
                    .map(|p| ContextItem::from_excerpt(p, WebOrigin::Query)),
            )
            .chain(
                document_pages
                    .iter()
                    .map(|p| ContextItem::from_excerpt(p, WebOrigin::Document)),
            )
            .collect();

        let total = candidates.len();
        let mut items = Vec::with_capacity(total);
        let mut used = 0usize;

        for mut item in candidates {
            let len = item.rendered_len();
            if used + len <= budget_chars {
                used += len;
                items.push(item);
            } else if items.is_empty() {
                let overflow = len - budget_chars;
                let content = item.content_mut();
                let keep = content.chars().count().saturating_sub(overflow);
                *content = content.chars().take(keep).collect();
                items.push(item);
                break;
            } else {
                break;
            }
        }

        let dropped = total - items.len();
        if dropped > 0 {
            tracing::debug!("Context budget {} chars: dropped {} items", budget_chars, dropped);
        }

        Self { items, dropped }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        self.items.iter().any(|item| item.source() == kind)
    }

    pub fn documents(&self) -> impl Iterator<Item = &ContextItem> {
        self.items
            .iter()
            .filter(|i| matches!(i, ContextItem::Document { .. }))
    }

    /// URLs of included pages from the given origin, in context order.
    pub fn web_urls(&self, wanted: WebOrigin) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ContextItem::Web { origin, url, .. } if *origin == wanted => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sectioned prompt text.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let docs: Vec<String> = self.documents().map(ContextItem::render).collect();
        if !docs.is_empty() {
            parts.push("=== Information from documents ===".to_string());
            parts.extend(docs);
        }

        for (origin, header) in [
            (WebOrigin::Query, "=== Information from URLs in the question ==="),
            (WebOrigin::Document, "=== Information from URLs mentioned in documents ==="),
        ] {
            let pages: Vec<String> = self
                .items
                .iter()
                .filter(|i| matches!(i, ContextItem::Web { origin: o, .. } if *o == origin))
                .map(ContextItem::render)
                .collect();
            if !pages.is_empty() {
                parts.push(header.to_string());
                parts.extend(pages);
            }
        }

        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, content: &str, score: f32) -> RetrievalHit {
        RetrievalHit {
            chunk_id: id.to_string(),
            document_id: "doc".to_string(),
            content: content.to_string(),
            score,
            metadata: serde_json::json!({ "document_name": "doc.md" }),
        }
    }

    fn page(url: &str, content: &str) -> WebExcerpt {
        WebExcerpt {
            url: url.to_string(),
            title: "T".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_order_is_docs_then_query_then_discovered() {
        let ctx = AssembledContext::assemble(
            &[hit("c0", "doc text", 0.9)],
            &[page("https://q.example", "q")],
            &[page("https://d.example", "d")],
            10_000,
        );

        assert_eq!(ctx.items.len(), 3);
        assert_eq!(ctx.items[0].source(), SourceKind::Documents);
        assert_eq!(ctx.web_urls(WebOrigin::Query), vec!["https://q.example"]);
        assert_eq!(ctx.web_urls(WebOrigin::Document), vec!["https://d.example"]);

        let rendered = ctx.render();
        let docs_at = rendered.find("from documents").unwrap();
        let query_at = rendered.find("in the question").unwrap();
        let found_at = rendered.find("mentioned in documents").unwrap();
        assert!(docs_at < query_at && query_at < found_at);
    }

    #[test]
    fn test_overflow_drops_from_tail() {
        let ctx = AssembledContext::assemble(
            &[hit("c0", &"a".repeat(40), 0.9), hit("c1", &"b".repeat(40), 0.8)],
            &[page("https://q.example", "q")],
            &[],
            50,
        );

        assert_eq!(ctx.items.len(), 1);
        assert_eq!(ctx.dropped, 2);
        assert!(!ctx.has(SourceKind::Web));
    }

    #[test]
    fn test_oversized_first_item_is_cut() {
        let ctx = AssembledContext::assemble(&[hit("c0", &"a".repeat(100), 0.9)], &[], &[], 30);
        assert_eq!(ctx.items.len(), 1);
        assert_eq!(ctx.items[0].render().chars().count(), 30);
    }

    #[test]
    fn test_empty() {
        let ctx = AssembledContext::assemble(&[], &[], &[], 100);
        assert!(ctx.is_empty());
        assert_eq!(ctx.render(), "");
    }
}

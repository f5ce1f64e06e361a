//! Routing and answer types.

use super::context::AssembledContext;
use serde::Serialize;
use std::fmt;

/// A context source the router can activate. Sources are not exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Documents,
    Web,
    GeneralKnowledge,
}

impl SourceKind {
    /// Attribution label reported with the answer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Documents => "A",
            Self::Web => "B",
            Self::GeneralKnowledge => "C",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Web => "web",
            Self::GeneralKnowledge => "general_knowledge",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the router decided for one query.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Activated sources in label order
    pub active: Vec<SourceKind>,

    /// Labels of sources whose context survived assembly (C when general knowledge is active)
    pub labels: Vec<String>,

    pub context: AssembledContext,

    /// Retriever that produced the hits ("vector" or "keyword")
    pub retriever: String,

    /// Best relevance among retrieved hits, 0.0 when there were none
    pub best_score: f32,

    /// One line per routing step, for logs and `--json` output
    pub trace: Vec<String>,
}

impl RoutingDecision {
    pub fn is_active(&self, kind: SourceKind) -> bool {
        self.active.contains(&kind)
    }

    /// Whether the synthesizer should be called at all.
    pub fn should_synthesize(&self) -> bool {
        !self.active.is_empty()
    }

    /// Active sources that still contribute after budgeting; general
    /// knowledge counts even though it brings no context.
    pub fn attributed(&self) -> Vec<SourceKind> {
        attributed_sources(&self.active, &self.context)
    }
}

pub(crate) fn attributed_sources(
    active: &[SourceKind],
    context: &AssembledContext,
) -> Vec<SourceKind> {
    active
        .iter()
        .copied()
        .filter(|kind| *kind == SourceKind::GeneralKnowledge || context.has(*kind))
        .collect()
}

/// Where a fetched page's URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebOrigin {
    Query,
    Document,
}

/// Synthesized answer plus attribution.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub labels: Vec<String>,

    /// Sorted, unique document names
    pub document_sources: Vec<String>,

    /// URLs fetched from the question
    pub query_web_sources: Vec<String>,

    /// URLs discovered in retrieved documents
    pub document_web_sources: Vec<String>,

    pub max_score: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<RoutingDecision>,
}

/// Footer URLs listed from documents.
const MAX_FOOTER_DOCUMENT_URLS: usize = 3;

impl AskResponse {
    /// Answer text followed by the attribution footer.
    pub fn render(&self) -> String {
        let mut out = self.answer.trim_end().to_string();

        if !self.document_sources.is_empty() {
            out.push_str(&format!(
                "\n\nSources: {}",
                self.document_sources.join(", ")
            ));
        }

        if !self.document_web_sources.is_empty() {
            let urls: Vec<&str> = self
                .document_web_sources
                .iter()
                .take(MAX_FOOTER_DOCUMENT_URLS)
                .map(String::as_str)
                .collect();
            out.push_str(&format!("\nRelated URLs from documents: {}", urls.join(", ")));
        }

        if !self.query_web_sources.is_empty() {
            out.push_str(&format!(
                "\nWeb sources: {}",
                self.query_web_sources.join(", ")
            ));
        }

        if self.labels.iter().any(|l| l == SourceKind::GeneralKnowledge.label()) {
            out.push_str(
                "\n\nNote: This answer is based on general knowledge, not your documents.",
            );
        }

        out
    }
}

/// Message returned when no source is active and general knowledge is off.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in your documents. \
     Try rephrasing your question or check that the documents cover this topic.";

/// Result of answering a question.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered(AskResponse),
    NoRelevantInformation { decision: RoutingDecision },
}

impl AskOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::Answered(response) => response.render(),
            Self::NoRelevantInformation { .. } => NO_RELEVANT_INFORMATION.to_string(),
        }
    }

    pub fn decision(&self) -> Option<&RoutingDecision> {
        match self {
            Self::Answered(response) => response.decision.as_ref(),
            Self::NoRelevantInformation { decision } => Some(decision),
        }
    }
}

//! Question answering: route, synthesize, attribute.

use super::context::ContextItem;
use super::router::Router;
use super::synth::AnswerSynthesizer;
use super::types::{AskOutcome, AskResponse, WebOrigin};
use docent_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Routes a question and, when any source is active, synthesizes the answer.
pub struct AskPipeline {
    router: Router,
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl AskPipeline {
    pub fn new(router: Router, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self {
            router,
            synthesizer,
        }
    }

    #[instrument(skip(self), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str, extended_knowledge: bool) -> AppResult<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Knowledge("Question is empty".to_string()));
        }

        let decision = self.router.route(question, extended_knowledge).await?;
        if !decision.should_synthesize() {
            info!("No source active and general knowledge disabled");
            return Ok(AskOutcome::NoRelevantInformation { decision });
        }

        let answer = self
            .synthesizer
            .synthesize(question, &decision.context, &decision.attributed())
            .await?;

        let document_sources: Vec<String> = decision
            .context
            .documents()
            .filter_map(|item| match item {
                ContextItem::Document { document_name, .. } => Some(document_name.clone()),
                ContextItem::Web { .. } => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(AskOutcome::Answered(AskResponse {
            answer,
            labels: decision.labels.clone(),
            document_sources,
            query_web_sources: decision.context.web_urls(WebOrigin::Query),
            document_web_sources: decision.context.web_urls(WebOrigin::Document),
            max_score: decision.best_score,
            decision: Some(decision),
        }))
    }
}

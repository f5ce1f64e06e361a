//! Answer synthesis over the language model boundary.

use super::context::AssembledContext;
use super::prompt::PromptBuilder;
use super::types::SourceKind;
use async_trait::async_trait;
use docent_core::{AppError, AppResult};
use docent_llm::{LlmClient, LlmRequest, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Context + question → answer text.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        context: &AssembledContext,
        sources: &[SourceKind],
    ) -> AppResult<String>;
}

/// Synthesizer backed by an [`LlmClient`], retried under a [`RetryPolicy`].
///
/// Attempts for one question run sequentially; an exhausted policy surfaces
/// as `AppError::Llm` and no partial answer is returned.
pub struct LlmSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    policy: RetryPolicy,
    prompts: PromptBuilder,
}

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1000;

impl LlmSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, policy: RetryPolicy) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            policy,
            prompts: PromptBuilder::new()?,
        })
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmSynthesizer {
    #[instrument(skip_all, fields(provider = self.client.provider_name(), model = %self.model))]
    async fn synthesize(
        &self,
        question: &str,
        context: &AssembledContext,
        sources: &[SourceKind],
    ) -> AppResult<String> {
        let prompt = self.prompts.render(question, context, sources)?;
        let request = LlmRequest::new(prompt, self.model.as_str())
            .with_system(self.prompts.system_prompt())
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let client = &self.client;
        let request = &request;
        let response = self
            .policy
            .run(move || async move { client.complete(request).await })
            .await?;

        let answer = response.content.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::Llm("Language model returned an empty answer".to_string()));
        }

        debug!("Synthesized {} chars", answer.len());
        Ok(answer)
    }
}

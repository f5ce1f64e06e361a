//! Handlebars prompt templates for answer synthesis.

use super::context::AssembledContext;
use super::types::SourceKind;
use docent_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

const GROUNDED_TEMPLATE: &str = "{{instruction}}

{{context}}

User question: {{question}}

Please provide a helpful and accurate answer based on the information provided. \
If you use specific information from the context, be precise and factual.";

const GENERAL_TEMPLATE: &str = "The user has asked a question, but no relevant information \
was found in their documents or in any provided web sources.

User question: {{question}}

Please provide a helpful answer using your general knowledge. Be clear, accurate, and concise.";

const SYSTEM_PROMPT: &str = "You are a knowledge assistant with access to the user's document \
collection. Answer directly. Do not mention chunks, embeddings or retrieval.";

#[derive(Serialize)]
struct GroundedVars<'a> {
    instruction: &'a str,
    context: String,
    question: &'a str,
}

#[derive(Serialize)]
struct GeneralVars<'a> {
    question: &'a str,
}

/// Renders synthesizer prompts from registered templates.
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();
        // Plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        for (name, template) in [("grounded", GROUNDED_TEMPLATE), ("general", GENERAL_TEMPLATE)] {
            registry
                .register_template_string(name, template)
                .map_err(|e| {
                    AppError::Knowledge(format!("Failed to register template '{}': {}", name, e))
                })?;
        }

        Ok(Self { registry })
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Prompt for `question` given the sources whose context survived assembly.
    pub fn render(
        &self,
        question: &str,
        context: &AssembledContext,
        sources: &[SourceKind],
    ) -> AppResult<String> {
        let has_docs = context.has(SourceKind::Documents);
        let has_web = context.has(SourceKind::Web);

        if !has_docs && !has_web {
            if sources.contains(&SourceKind::GeneralKnowledge) {
                return self.render_template("general", &GeneralVars { question });
            }
            return Err(AppError::Knowledge(
                "Cannot build a prompt without context or general knowledge".to_string(),
            ));
        }

        let instruction = match (has_docs, has_web) {
            (true, true) => {
                "Based on the following context from multiple sources (documents and web pages), \
                 please answer the user's question. Synthesize information from all sources where relevant."
            }
            (true, false) => {
                "Based on the following context from the user's documents, please answer the user's question."
            }
            _ => "Based on the following context from web pages, please answer the user's question.",
        };

        self.render_template(
            "grounded",
            &GroundedVars {
                instruction,
                context: context.render(),
                question,
            },
        )
    }

    fn render_template<T: Serialize>(&self, name: &str, vars: &T) -> AppResult<String> {
        self.registry
            .render(name, vars)
            .map_err(|e| AppError::Knowledge(format!("Failed to render prompt '{}': {}", name, e)))
    }
}

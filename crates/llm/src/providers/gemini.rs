//! Google Gemini provider implementation.
//!
//! Uses the `generateContent` REST endpoint with the API key passed in the
//! `x-goog-api-key` header.

use super::{classify_http_error, classify_transport_error};
use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini LLM client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub const DEFAULT_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(
        base_url: Option<&str>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config("Gemini provider requires API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(Self::DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn to_gemini_request(&self, request: &LlmRequest) -> GenerateContentRequest {
        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: system.clone(),
                }],
            }),
            generation_config,
        }
    }

    fn convert_response(
        &self,
        model: &str,
        response: GenerateContentResponse,
    ) -> AppResult<LlmResponse> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Llm("Gemini returned an empty completion".to_string()));
        }

        let usage = response
            .usage_metadata
            .map(|u| LlmUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: text,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Gemini");

        let body = self.to_gemini_request(request);
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error("Gemini", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_http_error("Gemini", status, &error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Gemini response: {}", e)))?;

        tracing::info!("Received completion from Gemini");

        self.convert_response(&request.model, parsed)
    }
}

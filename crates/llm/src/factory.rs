//! LLM provider factory.
//!
//! This module creates LLM clients from application configuration. It handles
//! provider resolution and secret injection.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient};
use crate::types::ProviderType;
use docent_core::{AppError, AppResult, LlmSettings};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the configured provider.
///
/// # Arguments
/// * `settings` - Provider, model, endpoint and timeout
/// * `api_key` - Resolved API key (for providers that require it)
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// secret is missing.
pub fn create_client(
    settings: &LlmSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", settings.provider)))?;
    let timeout = Duration::from_secs(settings.timeout_secs.max(1));

    tracing::debug!(provider = provider.as_str(), model = %settings.model, "Creating LLM client");

    match provider {
        ProviderType::Ollama => {
            let base_url = settings
                .endpoint
                .as_deref()
                .unwrap_or(OllamaClient::DEFAULT_URL);
            Ok(Arc::new(OllamaClient::with_timeout(base_url, timeout)?))
        }
        ProviderType::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Gemini provider requires API key".to_string())
            })?;
            Ok(Arc::new(GeminiClient::new(
                settings.endpoint.as_deref(),
                api_key,
                timeout,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> LlmSettings {
        LlmSettings {
            provider: provider.to_string(),
            ..LlmSettings::default()
        }
    }

    #[test]
    fn test_create_ollama_client() {
        let client = create_client(&settings("ollama"), None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let mut s = settings("ollama");
        s.endpoint = Some("http://localhost:8080".to_string());
        assert!(create_client(&s, None).is_ok());
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client(&settings("gemini"), None) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for Gemini without API key"),
        }
    }

    #[test]
    fn test_create_gemini_client() {
        let client = create_client(&settings("gemini"), Some("key")).unwrap();
        assert_eq!(client.provider_name(), "gemini");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client(&settings("unknown"), None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}

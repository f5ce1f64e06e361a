//! LLM provider implementations.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use docent_core::AppError;
use reqwest::StatusCode;

/// Map a non-success HTTP response onto the transient/permanent error split.
///
/// Quota exhaustion (429) is permanent. Overload, 5xx and `UNAVAILABLE` are transient.
pub(crate) fn classify_http_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{} API error ({}): {}", provider, status, body.trim());

    if status == StatusCode::TOO_MANY_REQUESTS
        || body.contains("RESOURCE_EXHAUSTED")
        || body.contains("Quota exceeded")
    {
        return AppError::Llm(format!("{} quota exceeded: {}", provider, body.trim()));
    }

    if status.is_server_error()
        || body.contains("UNAVAILABLE")
        || body.to_lowercase().contains("overloaded")
    {
        return AppError::LlmUnavailable(message);
    }

    AppError::Llm(message)
}

/// Map a transport failure. Timeouts and connection resets may succeed on retry.
pub(crate) fn classify_transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() {
        AppError::LlmUnavailable(format!("{} request failed: {}", provider, err))
    } else {
        AppError::Llm(format!("{} request failed: {}", provider, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_permanent() {
        let err = classify_http_error(
            "gemini",
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, AppError::Llm(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = classify_http_error("gemini", StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.is_transient());

        let err = classify_http_error("ollama", StatusCode::BAD_REQUEST, "model is overloaded");
        assert!(err.is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let err = classify_http_error("ollama", StatusCode::NOT_FOUND, "model not found");
        assert!(matches!(err, AppError::Llm(_)));
    }
}

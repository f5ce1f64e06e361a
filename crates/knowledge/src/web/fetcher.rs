//! Bounded HTTP fetch with HTML-to-text extraction.

use async_trait::async_trait;
use docent_core::{AppError, AppResult, WebConfig};
use futures::StreamExt;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; docent/0.1; +https://github.com/docent)";

const MAX_REDIRECTS: usize = 10;

/// Elements whose text never belongs in an excerpt.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "nav", "footer", "header", "head",
];

/// Plain-text excerpt of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebExcerpt {
    pub url: String,

    /// Page title, or the URL when the page has none
    pub title: String,

    pub content: String,
}

/// URL → bounded text. Implementations may fail; callers drop failures.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<WebExcerpt>;
}

/// Fetch every URL concurrently, keeping successes in input order.
pub async fn fetch_all(fetcher: &dyn ContentFetcher, urls: &[String]) -> Vec<WebExcerpt> {
    let results = futures::future::join_all(urls.iter().map(|url| fetcher.fetch(url))).await;

    urls.iter()
        .zip(results)
        .filter_map(|(url, result)| match result {
            Ok(excerpt) => Some(excerpt),
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                None
            }
        })
        .collect()
}

/// reqwest-backed fetcher honouring [`WebConfig`] limits.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    blocked_hosts: Vec<String>,
    max_bytes: usize,
    max_chars: usize,
    title_selector: Selector,
    body_selector: Selector,
}

impl HttpFetcher {
    pub fn new(config: &WebConfig) -> AppResult<Self> {
        let blocked_hosts: Vec<String> = config
            .blocked_hosts
            .iter()
            .map(|h| bare_host(&h.to_lowercase()).to_string())
            .collect();

        // Every redirect hop passes the same checks as the first URL
        let hop_blocklist = blocked_hosts.clone();
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(format!("More than {} redirects", MAX_REDIRECTS));
            }
            match check_target(attempt.url(), &hop_blocklist) {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let title_selector = Selector::parse("title")
            .map_err(|e| AppError::Config(format!("Invalid CSS selector: {:?}", e)))?;
        let body_selector = Selector::parse("body")
            .map_err(|e| AppError::Config(format!("Invalid CSS selector: {:?}", e)))?;

        Ok(Self {
            client,
            blocked_hosts,
            max_bytes: config.max_bytes,
            max_chars: config.max_chars,
            title_selector,
            body_selector,
        })
    }

    fn check_url(&self, raw: &str) -> AppResult<url::Url> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| AppError::Fetch(format!("Invalid URL {}: {}", raw, e)))?;
        check_target(&parsed, &self.blocked_hosts)?;
        Ok(parsed)
    }

    /// Title and visible text of an HTML document.
    fn extract_html(&self, html: &str) -> (Option<String>, String) {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title_selector)
            .next()
            .map(|t| t.text().collect::<String>())
            .map(|t| crate::chunker::normalize_text(&t))
            .filter(|t| !t.is_empty());

        let mut parts = Vec::new();
        match document.select(&self.body_selector).next() {
            Some(body) => collect_text(body, &mut parts),
            None => collect_text(document.root_element(), &mut parts),
        }

        (title, parts.join(" "))
    }

    fn truncate(&self, text: &str) -> String {
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

/// Reject non-HTTP schemes and blocked hosts.
fn check_target(url: &url::Url, blocked_hosts: &[String]) -> AppResult<()> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::Fetch(format!("Unsupported scheme: {}", url.scheme())));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::Fetch(format!("URL has no host: {}", url)))?
        .to_lowercase();

    if is_blocked(bare_host(&host), blocked_hosts) {
        return Err(AppError::Fetch(format!("Blocked host: {}", host)));
    }
    Ok(())
}

/// Exact match, or a subdomain of a blocked name.
fn is_blocked(host: &str, blocked_hosts: &[String]) -> bool {
    blocked_hosts.iter().any(|blocked| {
        host == blocked
            || host
                .strip_suffix(blocked.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// IPv6 literals without their URL brackets.
fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

pub(crate) fn collect_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    if SKIPPED_ELEMENTS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, parts);
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> AppResult<WebExcerpt> {
        let parsed = self.check_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let is_html = content_type.contains("text/html");
        if !is_html && !content_type.contains("text/plain") {
            return Err(AppError::Fetch(format!(
                "Unsupported content type: '{}'",
                content_type
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(AppError::Fetch(format!(
                    "Content length {} exceeds {} bytes",
                    length, self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::Fetch(format!("Read failed: {}", e)))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(AppError::Fetch(format!(
                    "Body exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let raw = String::from_utf8_lossy(&body);
        let (title, text) = if is_html {
            self.extract_html(&raw)
        } else {
            (None, raw.into_owned())
        };

        let content = self.truncate(&crate::chunker::normalize_text(&text));
        if content.is_empty() {
            return Err(AppError::Fetch("No text content".to_string()));
        }

        debug!("Fetched {} chars", content.chars().count());

        Ok(WebExcerpt {
            url: url.to_string(),
            title: title.unwrap_or_else(|| url.to_string()),
            content,
        })
    }
}

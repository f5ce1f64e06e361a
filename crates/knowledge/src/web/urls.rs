//! URL extraction from free text.

use docent_core::{AppError, AppResult};
use regex::Regex;
use std::collections::HashSet;

/// Punctuation that ends a sentence or a markdown link rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\''];

/// Finds http(s) URLs in text, in order of first appearance.
#[derive(Debug, Clone)]
pub struct UrlExtractor {
    pattern: Regex,
}

impl UrlExtractor {
    pub fn new() -> AppResult<Self> {
        let pattern = Regex::new(r#"https?://[^\s<>"`{}|\\^\[\]]+"#)
            .map_err(|e| AppError::Other(format!("Invalid URL pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Up to `max` distinct well-formed URLs from `text`.
    pub fn extract(&self, text: &str, max: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
            .filter(|candidate| url::Url::parse(candidate).is_ok_and(|u| u.host_str().is_some()))
            .filter(|candidate| seen.insert(candidate.to_string()))
            .take(max)
            .map(str::to_string)
            .collect()
    }

    /// URLs across several texts, deduplicated and capped as a whole.
    pub fn extract_all<'a>(&self, texts: impl IntoIterator<Item = &'a str>, max: usize) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for text in texts {
            if urls.len() >= max {
                break;
            }
            for url in self.extract(text, max) {
                if urls.len() < max && !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_in_order_and_caps() {
        let extractor = UrlExtractor::new().unwrap();
        let text = "See https://a.example/x and http://b.example, then https://c.example.";
        assert_eq!(
            extractor.extract(text, 2),
            vec!["https://a.example/x", "http://b.example"]
        );
    }

    #[test]
    fn test_trims_markdown_and_sentence_punctuation() {
        let extractor = UrlExtractor::new().unwrap();
        let text = "Docs are [here](https://docs.rs/tokio). Also https://tokio.rs!";
        assert_eq!(
            extractor.extract(text, 5),
            vec!["https://docs.rs/tokio", "https://tokio.rs"]
        );
    }

    #[test]
    fn test_deduplicates() {
        let extractor = UrlExtractor::new().unwrap();
        let text = "https://a.example https://a.example https://b.example";
        assert_eq!(extractor.extract(text, 5).len(), 2);
    }

    #[test]
    fn test_ignores_malformed() {
        let extractor = UrlExtractor::new().unwrap();
        assert!(extractor.extract("http:// nothing here, ftp://x.example", 5).is_empty());
    }

    #[test]
    fn test_extract_all_spans_texts() {
        let extractor = UrlExtractor::new().unwrap();
        let urls = extractor.extract_all(
            ["see https://a.example", "and https://a.example or https://b.example", "https://c.example"],
            2,
        );
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }
}

//! URL discovery and bounded web fetching.
//!
//! URLs come from two places: the question itself and the content of chunks
//! that cleared the discovery threshold. Every fetch failure is logged and
//! the URL dropped; nothing here is ever a user-visible error.

pub mod fetcher;
pub mod urls;

pub use fetcher::{fetch_all, ContentFetcher, HttpFetcher, WebExcerpt};
pub use urls::UrlExtractor;

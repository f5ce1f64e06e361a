//! Cross-module behavioural tests.

mod rag_ranking;
mod support;

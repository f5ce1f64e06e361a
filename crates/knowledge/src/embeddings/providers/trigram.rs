//! Trigram embedding provider: deterministic, offline, content-aware vectors.

use crate::embeddings::provider::EmbeddingProvider;
use docent_core::AppResult;
use std::collections::HashMap;

/// Words too common to carry meaning.
pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Each content word contributes to the dimensions its character trigrams
/// hash to, plus one dimension for the whole word. Vectors are normalized
/// to unit length, so cosine similarity reduces to a dot product. Not a
/// semantic model, but identical text always maps to identical vectors.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

fn hash_bytes(bytes: &[u8], multiplier: u64) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let idx = (hash_bytes(trigram.as_bytes(), 37) as usize) % self.dimensions;
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = (hash_bytes(word.as_bytes(), 31) as usize) % self.dimensions;
            embedding[idx] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}

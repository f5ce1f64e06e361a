//! Text normalization and fixed-window chunking.
//!
//! Windows are measured in characters, never bytes, so multi-byte text is
//! split on character boundaries. Window `i` starts at `i * (size - overlap)`
//! and spans `size` characters; the last window may be shorter.

use docent_core::{AppError, AppResult, ChunkingConfig};
use sha2::{Digest, Sha256};

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Calculate SHA-256 hash of text.
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic chunk identifier.
pub fn chunk_id(document_id: &str, ordinal: u32) -> String {
    format!("{}_chunk_{}", document_id, ordinal)
}

/// Window size and overlap, validated so that `overlap < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> AppResult<Self> {
        if size == 0 || overlap >= size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> AppResult<Self> {
        Self::new(config.size, config.overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Iterate the windows of `text`. Calling this again restarts from ordinal 0.
    pub fn windows<'a>(&self, text: &'a str) -> ChunkWindows<'a> {
        ChunkWindows {
            text,
            size: self.size,
            step: self.size - self.overlap,
            ordinal: 0,
            start_byte: 0,
            start_char: 0,
            done: text.is_empty(),
        }
    }
}

/// One window produced by [`ChunkWindows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow<'a> {
    pub ordinal: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub text: &'a str,
}

/// Ordered, finite iterator over the windows of a text.
#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    text: &'a str,
    size: usize,
    step: usize,
    ordinal: u32,
    start_byte: usize,
    start_char: usize,
    done: bool,
}

impl<'a> Iterator for ChunkWindows<'a> {
    type Item = ChunkWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.start_byte..];
        let (end_byte, char_len) = match rest.char_indices().nth(self.size) {
            Some((offset, _)) => (self.start_byte + offset, self.size),
            None => {
                self.done = true;
                (self.text.len(), rest.chars().count())
            }
        };

        let window = ChunkWindow {
            ordinal: self.ordinal,
            char_start: self.start_char,
            char_end: self.start_char + char_len,
            text: &self.text[self.start_byte..end_byte],
        };

        if !self.done {
            // A full window was taken, so `step < size` characters remain ahead.
            let advance = rest
                .char_indices()
                .nth(self.step)
                .map(|(offset, _)| offset)
                .unwrap_or(rest.len());
            self.start_byte += advance;
            self.start_char += self.step;
            self.ordinal += 1;
        }

        Some(window)
    }
}

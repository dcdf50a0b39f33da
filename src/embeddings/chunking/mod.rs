
use tracing::debug;

use crate::config::IngestionConfig;

/// Configuration for word-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Words per chunk; the last chunk of a text may be shorter
    pub max_words: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self { max_words: 600 }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    #[inline]
    fn from(config: &IngestionConfig) -> Self {
        Self {
            max_words: config.max_words,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.max_words)
    }
}

/// Split `text` into consecutive windows of `max_words` whitespace-separated
/// words, each joined with single spaces. A `max_words` of zero is treated as one.
#[inline]
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();

    let chunks: Vec<String> = words
        .chunks(max_words)
        .map(|window| window.join(" "))
        .collect();

    debug!(
        "Split {} words into {} chunks of up to {} words",
        words.len(),
        chunks.len(),
        max_words
    );

    chunks
}

#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

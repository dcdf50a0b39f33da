// LanceDB chunk table: one row per embedded chunk of scraped text

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

/// A chunk of scraped text with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    /// Source exactly as supplied to ingestion (URL or local file path)
    pub source_url: String,
    /// Position of the chunk within its source
    pub chunk_index: u32,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl ChunkRecord {
    /// New record with a fresh id and the current time
    #[inline]
    pub fn new(source_url: &str, chunk_index: u32, text: String, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            text,
            source_url: source_url.to_string(),
            chunk_index,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// First `max_chars` characters of the text
    #[inline]
    pub fn snippet(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}

/// Search hit with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    /// Cosine similarity, higher is better
    pub score: f32,
    pub distance: f32,
}

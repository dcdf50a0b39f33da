// Text chunking and hosted embedding generation

pub mod chunking;
pub mod gemini;

pub use chunking::{ChunkingConfig, chunk_text, word_count};
pub use gemini::{EmbeddingError, GeminiEmbedder};

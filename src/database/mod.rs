// Chunk persistence backed by LanceDB

pub mod lancedb;

pub use self::lancedb::{ChunkRecord, ScoredChunk, vector_store::VectorStore};

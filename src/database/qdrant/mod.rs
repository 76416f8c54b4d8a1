// Qdrant vector database module
// Point/payload types and the REST-backed vector store


pub mod vector_store;

pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload stored alongside every chunk vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkPayload {
    /// Path of the source file, relative to the indexed root
    pub file_path: String,
    /// Position of this chunk within its file
    pub chunk_index: usize,
    /// The chunk text
    pub content: String,
    /// File extension, or `text`
    pub language: String,
}

/// A point ready to be upserted
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    #[inline]
    pub fn new(vector: Vec<f32>, payload: ChunkPayload) -> Self {
        Self {
            id: point_id(&payload.file_path, payload.chunk_index),
            vector,
            payload,
        }
    }
}

/// A search hit as returned by Qdrant
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Summary of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub status: String,
    pub points_count: u64,
    pub vector_size: u64,
    pub distance: String,
}

/// Deterministic point id for a chunk, so re-indexing overwrites in place
#[inline]
pub fn point_id(file_path: &str, chunk_index: usize) -> Uuid {
    let key = format!("{}:{}", file_path, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
}

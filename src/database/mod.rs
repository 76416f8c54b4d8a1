// Database module
// The vector database is an external Qdrant instance reached over its REST API

pub mod qdrant;

pub use qdrant::{ChunkPayload, ChunkPoint, CollectionInfo, ScoredChunk, VectorStore, point_id};

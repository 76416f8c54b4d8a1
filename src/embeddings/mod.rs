// Embeddings module
// Fixed-window text chunking and the Ollama embedding client

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_text, language_for_path};
pub use ollama::{EmbeddingResult, OllamaClient};

#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Configuration for fixed-size chunking, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Split text into overlapping fixed-size windows.
///
/// Windows are counted in `char`s so multi-byte text is never split inside a
/// code point. Each window after the first starts `overlap` characters before
/// the end of the previous one, and splitting stops as soon as a window
/// reaches the end of the text.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("Chunk size must be greater than zero");
    }
    if overlap >= chunk_size {
        bail!(
            "Overlap ({}) must be smaller than chunk size ({})",
            overlap,
            chunk_size
        );
    }

    // Byte offset of every char boundary, plus the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        #[expect(clippy::string_slice, reason = "offsets come from char_indices")]
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());

        if end == char_count {
            break;
        }
        start = end - overlap;
    }

    debug!(
        "Split {} chars into {} chunks (size {}, overlap {})",
        char_count,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Chunk text using the sizes from a [`ChunkingConfig`]
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    chunk_text(text, config.chunk_size, config.overlap)
}

/// Language tag stored with each chunk: the file extension, or `text`
#[inline]
pub fn language_for_path(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map_or_else(|| "text".to_string(), str::to_lowercase)
}

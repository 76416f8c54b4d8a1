// Indexer module
// Walks a codebase, chunks each text file and stores the chunk embeddings in Qdrant

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::DeckError;
use crate::config::Config;
use crate::database::qdrant::{ChunkPayload, ChunkPoint, CollectionInfo, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, chunk_with_config, language_for_path};
use crate::embeddings::ollama::OllamaClient;

/// Path components that are never descended into
const EXCLUDED_COMPONENTS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".DS_Store",
    "target",
];

/// File name suffixes that are never indexed
const EXCLUDED_SUFFIXES: &[&str] = &[
    ".pyc", ".pyo", ".pyd", ".log", ".tmp", ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico",
    ".mp4", ".avi", ".mov", ".zip", ".tar.gz",
];

/// Extensions of files worth embedding
const TEXT_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "cpp", "c", "h", "hpp", "cs", "php", "rb", "go", "rs", "swift", "kt",
    "scala", "clj", "hs", "ml", "fs", "elm", "dart", "lua", "pl", "pm", "tcl", "r", "m", "sh",
    "bash", "zsh", "fish", "ps1", "sql", "xml", "html", "css", "scss", "sass", "less", "json",
    "yaml", "yml", "toml", "ini", "cfg", "conf", "md", "txt", "rst",
];

/// Counters reported at the end of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub errors: usize,
}

pub struct CodebaseIndexer {
    ollama: OllamaClient,
    store: VectorStore,
    chunking: ChunkingConfig,
    vector_size: u64,
}

impl CodebaseIndexer {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let ollama =
            OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
        let store =
            VectorStore::new(&config.qdrant).context("Failed to initialize Qdrant client")?;

        Ok(Self::from_parts(
            ollama,
            store,
            config.chunking.clone(),
            u64::from(config.ollama.embedding_dimension),
        ))
    }

    #[inline]
    pub fn from_parts(
        ollama: OllamaClient,
        store: VectorStore,
        chunking: ChunkingConfig,
        vector_size: u64,
    ) -> Self {
        Self {
            ollama,
            store,
            chunking,
            vector_size,
        }
    }

    /// Both services must be reachable, and the embedding model pulled
    #[inline]
    pub fn check_services(&self) -> Result<()> {
        self.ollama
            .health_check()
            .with_context(|| format!("Ollama check failed for model '{}'", self.ollama.model()))?;
        self.store
            .health_check()
            .context("Qdrant check failed")?;

        info!("Ollama and Qdrant are ready");
        Ok(())
    }

    /// Ensure the collection exists with the configured vector size
    #[inline]
    pub fn prepare_collection(&self) -> Result<CollectionInfo> {
        let info = self.store.ensure_collection(self.vector_size)?;
        if info.vector_size != self.vector_size {
            return Err(DeckError::VectorStore(format!(
                "Collection '{}' stores {}-dimensional vectors but the embedding model is configured for {}",
                info.name, info.vector_size, self.vector_size
            ))
            .into());
        }
        Ok(info)
    }

    /// Chunk and embed one document, upserting a point per non-blank chunk.
    ///
    /// Returns the number of chunks written.
    #[inline]
    pub fn index_document(&self, file_path: &str, content: &str) -> Result<usize> {
        let language = language_for_path(Path::new(file_path));
        let chunks = chunk_with_config(content, &self.chunking)
            .with_context(|| format!("Failed to chunk {}", file_path))?;

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            if chunk.trim().is_empty() {
                continue;
            }

            let embedding = self
                .ollama
                .generate_embedding(&chunk)
                .with_context(|| format!("Failed to embed chunk {} of {}", chunk_index, file_path))?;

            if embedding.embedding.len() as u64 != self.vector_size {
                return Err(DeckError::Embedding(format!(
                    "Embedding for {} has {} dimensions, expected {}",
                    file_path,
                    embedding.embedding.len(),
                    self.vector_size
                ))
                .into());
            }

            points.push(ChunkPoint::new(
                embedding.embedding,
                ChunkPayload {
                    file_path: file_path.to_string(),
                    chunk_index,
                    content: chunk,
                    language: language.clone(),
                },
            ));
        }

        self.store
            .upsert(&points)
            .with_context(|| format!("Failed to store chunks of {}", file_path))?;

        debug!("Indexed {} chunks from {}", points.len(), file_path);
        Ok(points.len())
    }

    /// Index every eligible file below `root`
    #[inline]
    pub fn index_directory(&self, root: &Path) -> Result<IndexingStats> {
        let info = self.prepare_collection()?;
        info!(
            "Indexing {} into '{}' ({} points before run)",
            root.display(),
            info.name,
            info.points_count
        );

        let files: Vec<DirEntry> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded_component(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .is_ok_and(should_index_file)
            })
            .collect();

        let mut stats = IndexingStats {
            files_seen: files.len(),
            ..IndexingStats::default()
        };

        let bar = if console::user_attended_stderr() {
            ProgressStyle::with_template("{bar:40} [{pos}/{len}] {msg}")
                .map(|style| ProgressBar::new(files.len() as u64).with_style(style))
                .unwrap_or_else(|_| ProgressBar::new(files.len() as u64))
        } else {
            ProgressBar::hidden()
        };

        for entry in files {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let label = relative.to_string_lossy().replace('\\', "/");
            bar.set_message(label.clone());

            match self.index_file(entry.path(), &label) {
                Ok(0) => debug!("Nothing to index in {}", label),
                Ok(chunks) => {
                    stats.files_indexed += 1;
                    stats.chunks_indexed += chunks;
                }
                Err(e) => {
                    error!("Error processing {}: {:#}", label, e);
                    stats.errors += 1;
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Indexing complete: {} chunks from {} of {} files ({} errors)",
            stats.chunks_indexed, stats.files_indexed, stats.files_seen, stats.errors
        );
        Ok(stats)
    }

    fn index_file(&self, path: &Path, label: &str) -> Result<usize> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let content = String::from_utf8_lossy(&bytes);
        if content.trim().is_empty() {
            return Ok(0);
        }
        self.index_document(label, &content)
    }
}

/// Whether a path (relative to the indexed root) should be embedded
#[inline]
pub fn should_index_file(path: &Path) -> bool {
    let excluded = path.components().any(|component| match component {
        Component::Normal(name) => EXCLUDED_COMPONENTS
            .iter()
            .any(|excluded| name.to_str() == Some(*excluded)),
        _ => false,
    });
    if excluded {
        return false;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    if EXCLUDED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn is_excluded_component(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| EXCLUDED_COMPONENTS.contains(&name))
}

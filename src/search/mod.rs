// Semantic search over the indexed codebase
// Embeds the query with Ollama and ranks chunks through Qdrant


use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use crate::DeckError;
use crate::config::Config;
use crate::database::qdrant::vector_store::payload_as;
use crate::database::qdrant::{ChunkPayload, CollectionInfo, VectorStore};
use crate::embeddings::ollama::OllamaClient;

const RULE_WIDTH: usize = 80;

/// A ranked search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub language: String,
}

/// Aggregate figures about an indexed collection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionStatistics {
    pub total_chunks: u64,
    pub total_files: usize,
    pub languages: BTreeMap<String, usize>,
    pub collection_status: String,
}

pub struct SemanticSearch {
    ollama: OllamaClient,
    store: VectorStore,
    vector_size: u64,
}

impl SemanticSearch {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let ollama =
            OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
        let store =
            VectorStore::new(&config.qdrant).context("Failed to initialize Qdrant client")?;

        Ok(Self::from_parts(
            ollama,
            store,
            u64::from(config.ollama.embedding_dimension),
        ))
    }

    #[inline]
    pub fn from_parts(ollama: OllamaClient, store: VectorStore, vector_size: u64) -> Self {
        Self {
            ollama,
            store,
            vector_size,
        }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Check both services, reporting the first one that is unreachable
    #[inline]
    pub fn health_check(&self) -> (bool, String) {
        if let Err(e) = self.store.health_check() {
            warn!("Qdrant health check failed: {:#}", e);
            return (false, format!("Cannot connect to Qdrant: {:#}", e));
        }

        if let Err(e) = self.ollama.health_check() {
            warn!("Ollama health check failed: {:#}", e);
            return (false, format!("Cannot connect to Ollama: {:#}", e));
        }

        (true, "All services healthy".to_string())
    }

    /// Embed `query` and return hits scoring at least `score_threshold`,
    /// best first
    #[inline]
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        info!(
            "Searching '{}' for {:?} (limit {}, threshold {})",
            self.store.collection(),
            query,
            limit,
            score_threshold
        );

        let embedding = self
            .ollama
            .generate_embedding(query)
            .context("Failed to embed search query")?;

        let hits = self
            .store
            .search(&embedding.embedding, limit, score_threshold)
            .context("Vector search failed")?;

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.score >= score_threshold)
            .map(|hit| SearchResult {
                content: hit.payload.content,
                file_path: hit.payload.file_path,
                chunk_index: hit.payload.chunk_index,
                score: hit.score,
                language: hit.payload.language,
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);

        debug!("{} results after ranking", results.len());
        Ok(results)
    }

    #[inline]
    pub fn collection_info(&self) -> Result<CollectionInfo> {
        self.store.get_collection()
    }

    #[inline]
    pub fn create_collection(&self) -> Result<()> {
        self.store.create_collection(self.vector_size)
    }

    #[inline]
    pub fn delete_collection(&self) -> Result<()> {
        self.store.delete_collection()
    }

    /// Chunk, file and language counts for the collection
    #[inline]
    pub fn statistics(&self) -> Result<CollectionStatistics> {
        let info = self.collection_info()?;
        let payloads = self.store.scroll_payloads()?;

        let mut files = HashSet::new();
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for payload in &payloads {
            if let Some(file_path) = payload.get("file_path").and_then(|v| v.as_str()) {
                files.insert(file_path.to_string());
            }
            if let Some(language) = payload.get("language").and_then(|v| v.as_str()) {
                *languages.entry(language.to_string()).or_default() += 1;
            }
        }

        let unparsed = payloads
            .iter()
            .filter(|payload| payload_as::<ChunkPayload>(payload).is_none())
            .count();
        if unparsed > 0 {
            warn!(
                "{} points in '{}' do not carry a chunk payload",
                unparsed, info.name
            );
        }

        Ok(CollectionStatistics {
            total_chunks: info.points_count,
            total_files: files.len(),
            languages,
            collection_status: info.status,
        })
    }

    /// The collection, failing when it has nothing to search
    #[inline]
    pub fn require_populated_collection(&self) -> Result<CollectionInfo> {
        let info = self.collection_info()?;
        if info.points_count == 0 {
            return Err(DeckError::NotFound(format!(
                "Collection '{}' is empty. Run indexing first.",
                info.name
            ))
            .into());
        }
        Ok(info)
    }
}

/// Render results for the clipboard
#[inline]
pub fn format_results(results: &[SearchResult], max_content_length: usize) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut output = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = writeln!(output, "Result {} (score: {:.2})", i + 1, result.score);
        let _ = writeln!(
            output,
            "File: {} (chunk {}, {})",
            result.file_path, result.chunk_index, result.language
        );
        let _ = writeln!(output, "{}", "-".repeat(40));
        let _ = writeln!(output, "{}", truncate(&result.content, max_content_length));
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Wrap formatted results with the query header
#[inline]
pub fn format_search_report(query: &str, info: &CollectionInfo, formatted: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    [
        rule.as_str(),
        "SEMANTIC SEARCH RESULTS",
        rule.as_str(),
        &format!("Query: {}", query),
        &format!("Collection: {}", info.name),
        &format!("Total indexed chunks: {}", info.points_count),
        rule.as_str(),
        "",
        formatted,
    ]
    .join("\n")
}

/// Statistics report printed and copied by the `stats` command
#[inline]
pub fn format_statistics(
    health: &(bool, String),
    info: &CollectionInfo,
    stats: &CollectionStatistics,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let health_status = if health.0 {
        "✅ Healthy".to_string()
    } else {
        format!("❌ Issues: {}", health.1)
    };

    let mut lines = vec![
        rule.clone(),
        "QDRANT SEMANTIC SEARCH STATISTICS".to_string(),
        rule.clone(),
        String::new(),
        format!("Health Status: {}", health_status),
        String::new(),
        "COLLECTION INFO:".to_string(),
        format!("  Name: {}", info.name),
        format!("  Status: {}", info.status),
        format!("  Vector Size: {} dimensions", info.vector_size),
        format!("  Distance Metric: {}", info.distance),
        String::new(),
        "INDEXING STATISTICS:".to_string(),
        format!("  Total Chunks: {}", stats.total_chunks),
        format!("  Total Files: {}", stats.total_files),
        format!("  Collection Status: {}", stats.collection_status),
        String::new(),
        "LANGUAGE DISTRIBUTION:".to_string(),
    ];

    if stats.languages.is_empty() {
        lines.push("  No language data available".to_string());
    } else {
        let mut sorted: Vec<(&String, &usize)> = stats.languages.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let total = stats.total_chunks.max(1) as f64;
        for (language, count) in sorted {
            let percentage = *count as f64 / total * 100.0;
            lines.push(format!(
                "  {:15}: {:6} chunks ({:5.1}%)",
                language, count, percentage
            ));
        }
    }

    lines.push(String::new());
    lines.push(rule);
    lines.join("\n")
}

fn truncate(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

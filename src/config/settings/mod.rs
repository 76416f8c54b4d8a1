
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub links: LinkCheckConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub collection: String,
    /// Sent as the `api-key` header when set
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 6333,
            collection: "codebase".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub score_threshold: f32,
    /// Snippet length (in characters) shown per result
    pub max_content_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            score_threshold: 0.3,
            max_content_length: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupConfig {
    /// Stream Deck configuration folder; platform default when unset
    pub source_dir: Option<PathBuf>,
    /// Where backups are written; `<config dir>/backups` when unset
    pub backup_dir: Option<PathBuf>,
    pub keep_count: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            backup_dir: None,
            keep_count: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkCheckConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub default_provider: String,
    /// Overrides the provider's default model
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            model: None,
            max_tokens: 1000,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid score threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidScoreThreshold(f32),
    #[error("Invalid result limit: {0} (must be at least 1)")]
    InvalidLimit(usize),
    #[error("Invalid backup keep count: {0} (must be at least 1)")]
    InvalidKeepCount(usize),
    #[error("Invalid retry count: {0} (must be at least 1)")]
    InvalidRetries(u32),
    #[error("Invalid max tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.qdrant.validate()?;
        self.validate_chunking_config()?;
        self.validate_search_config()?;

        if self.backup.keep_count == 0 {
            return Err(ConfigError::InvalidKeepCount(self.backup.keep_count));
        }

        if self.links.max_retries == 0 {
            return Err(ConfigError::InvalidRetries(self.links.max_retries));
        }
        validate_timeout(self.links.timeout_seconds)?;

        if self.ai.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.ai.max_tokens));
        }
        validate_timeout(self.ai.timeout_seconds)?;

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_search_config(&self) -> Result<(), ConfigError> {
        let config = &self.search;

        if !(0.0..=1.0).contains(&config.score_threshold) {
            return Err(ConfigError::InvalidScoreThreshold(config.score_threshold));
        }

        if config.limit == 0 {
            return Err(ConfigError::InvalidLimit(config.limit));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn qdrant_url(&self) -> Result<Url, ConfigError> {
        self.qdrant.qdrant_url()
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding one log file per script
    #[inline]
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    #[inline]
    pub fn backup_dir(&self) -> PathBuf {
        self.backup
            .backup_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("backups"))
    }

    /// Stream Deck configuration folder for the current platform
    #[inline]
    pub fn streamdeck_dir(&self) -> PathBuf {
        self.backup
            .source_dir
            .clone()
            .unwrap_or_else(default_streamdeck_dir)
    }
}

fn default_streamdeck_dir() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    if cfg!(windows) {
        data_dir.join("Elgato").join("StreamDeck")
    } else {
        data_dir.join("com.elgato.StreamDeck")
    }
}

/// Timeouts must lie in 1..=600 seconds
#[inline]
pub fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

fn build_url(protocol: &str, host: &str, port: u16) -> Result<Url, ConfigError> {
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::InvalidProtocol(protocol.to_string()));
    }

    let url_str = format!("{}://{}:{}", protocol, host, port);
    Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        build_url(&self.protocol, &self.host, self.port)?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        build_url(&self.protocol, &self.host, self.port)
    }
}

impl QdrantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        build_url(&self.protocol, &self.host, self.port)?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn qdrant_url(&self) -> Result<Url, ConfigError> {
        build_url(&self.protocol, &self.host, self.port)
    }
}

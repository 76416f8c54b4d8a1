// Configuration management module
// TOML settings plus `.env` loading for API keys

pub mod settings;


use std::path::PathBuf;

use console::style;
use tracing::debug;

pub use settings::{
    AiConfig, BackupConfig, Config, ConfigError, LinkCheckConfig, OllamaConfig, QdrantConfig,
    SearchConfig, validate_timeout,
};

/// Environment variable that overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "DECKHAND_CONFIG_DIR";

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join("deckhand"))
        .ok_or(ConfigError::DirectoryError)
}

/// Load `.env` files from the working directory and the config directory.
/// Variables already present in the environment are left untouched.
#[inline]
pub fn load_env_files(config_dir: &std::path::Path) {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", path.display());
    }

    let config_env = config_dir.join(".env");
    if config_env.exists() {
        match dotenvy::from_path(&config_env) {
            Ok(()) => debug!("Loaded environment from {}", config_env.display()),
            Err(e) => debug!("Could not load {}: {}", config_env.display(), e),
        }
    }
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Qdrant Settings:").bold().yellow());
    match config.qdrant_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Collection: {}", style(&config.qdrant.collection).cyan());

    eprintln!();
    eprintln!("{}", style("Indexing & Search:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} chars (overlap {})",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.overlap).cyan()
    );
    eprintln!(
        "  Results: top {} above {:.2}",
        style(config.search.limit).cyan(),
        style(config.search.score_threshold).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Backups:").bold().yellow());
    eprintln!(
        "  Source: {}",
        style(config.streamdeck_dir().display()).cyan()
    );
    eprintln!("  Stored in: {}", style(config.backup_dir().display()).cyan());
    eprintln!("  Keep: {}", style(config.backup.keep_count).cyan());

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Logs: {}", style(config.logs_dir().display()).dim());
}

// One function per hotkey script
// Each script runs inside `run_script`, which owns error reporting and the exit code

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::DeckError;
use crate::ai::{AiClient, Provider};
use crate::backup::StreamDeckBackup;
use crate::clipboard::{get_clipboard, set_clipboard};
use crate::config::{Config, validate_timeout};
use crate::docker::{DockerManager, summarize_containers};
use crate::git::{GitManager, summarize_status};
use crate::indexer::CodebaseIndexer;
use crate::links::{LinkChecker, LinkIssue, LinkKind, generate_report};
use crate::notify::show_notification;
use crate::search::{SemanticSearch, format_results, format_search_report, format_statistics};

/// Environment variable naming the default repository for git scripts
pub const GIT_REPO_ENV: &str = "GIT_REPO_PATH";

const DOCKER_LOG_LINES: usize = 100;
const GIT_LOG_COUNT: usize = 10;
const CLIPBOARD_LABEL: &str = "clipboard.txt";
const PREVIEW_CHARS: usize = 50;

/// Run one script: log any error with its full context chain, raise a
/// notification titled `error_title`, and turn the outcome into an exit code.
#[inline]
pub fn run_script<F>(error_title: &str, script: F) -> ExitCode
where
    F: FnOnce() -> Result<ExitCode>,
{
    match script() {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {:#}", error_title, e);
            show_notification(error_title, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Send the clipboard to a chat model and replace it with the answer
#[inline]
pub fn ai_query(config: &Config, provider: Option<&str>) -> Result<ExitCode> {
    let provider: Provider = provider
        .unwrap_or(&config.ai.default_provider)
        .parse()?;

    let prompt = clipboard_text("Clipboard is empty")?;
    let mut client = AiClient::new(provider, &config.ai)?;
    if let Some(model) = &config.ai.model {
        client = client.with_model(model.as_str());
    }

    show_notification("AI Query", &format!("Sending to {}...", provider));
    let response = client.query(&prompt)?;

    set_clipboard(&response)?;
    show_notification(
        "AI Response",
        &format!("Response copied to clipboard\nModel: {}", client.model()),
    );
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn backup(config: &Config) -> Result<ExitCode> {
    info!("Starting Stream Deck backup");
    let manager = StreamDeckBackup::from_config(config);
    let (backup_dir, manifest) = manager.create_backup()?;

    let name = backup_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    show_notification(
        "Stream Deck Backup",
        &format!(
            "Backup completed\nDevices: {}\nLocation: {}",
            manifest.device_count, name
        ),
    );

    let removed = manager.cleanup_old_backups(config.backup.keep_count)?;
    if !removed.is_empty() {
        info!("Pruned {} old backups", removed.len());
    }
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn restore(config: &Config, backup_path: Option<&Path>) -> Result<ExitCode> {
    info!("Starting Stream Deck restore");
    let manifest = StreamDeckBackup::from_config(config).restore_from_backup(backup_path)?;

    show_notification(
        "Stream Deck Restore",
        &format!(
            "Restore completed\nDevices: {}\nFrom: {}",
            manifest.device_count, manifest.datetime
        ),
    );
    info!("Restart the Stream Deck software to apply changes");
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn restore_device(config: &Config, serial: &str) -> Result<ExitCode> {
    StreamDeckBackup::from_config(config).restore_single_device(serial, None)?;
    show_notification("Stream Deck Restore", &format!("Restored device {}", serial));
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn docker_status() -> Result<ExitCode> {
    let containers = DockerManager::new().container_status()?;
    show_notification("Docker Status", &summarize_containers(&containers));

    for container in &containers {
        info!("{}: {} ({})", container.name, container.status, container.image);
    }
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn docker_restart(container: &str) -> Result<ExitCode> {
    DockerManager::new().restart_container(container)?;
    show_notification("Docker", &format!("Restarted {}", container));
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn docker_stop_all() -> Result<ExitCode> {
    let stopped = DockerManager::new().stop_all_containers()?;
    show_notification("Docker", &format!("Stopped {} containers", stopped));
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn docker_logs(container: &str) -> Result<ExitCode> {
    let logs = DockerManager::new().container_logs(container, DOCKER_LOG_LINES)?;
    set_clipboard(&logs)?;
    show_notification(
        "Docker Logs",
        &format!("Last {} lines of {} copied to clipboard", DOCKER_LOG_LINES, container),
    );
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn docker_cleanup() -> Result<ExitCode> {
    let removed = DockerManager::new().cleanup_images()?;
    show_notification("Docker", &format!("Removed {} dangling images", removed.len()));
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn git_status(repo: Option<&Path>) -> Result<ExitCode> {
    let git = GitManager::new(resolve_repo_path(repo)?);
    let branch = git.current_branch()?;
    let status = git.status()?;

    show_notification("Git Status", &summarize_status(&branch, &status));
    Ok(ExitCode::SUCCESS)
}

/// Commit everything in the default repository. The message defaults to the
/// clipboard text.
#[inline]
pub fn git_commit(message: Option<&str>) -> Result<ExitCode> {
    let message = match message {
        Some(message) => message.to_string(),
        None => clipboard_text("No commit message in clipboard")?,
    };

    let git = GitManager::new(resolve_repo_path(None)?);
    git.quick_commit(&message)?;
    show_notification("Git Commit", &preview(&message));
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn git_push(repo: Option<&Path>) -> Result<ExitCode> {
    let git = GitManager::new(resolve_repo_path(repo)?);
    git.push("origin", None)?;
    show_notification("Git Push", "Pushed to origin");
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn git_pull(repo: Option<&Path>) -> Result<ExitCode> {
    let git = GitManager::new(resolve_repo_path(repo)?);
    git.pull("origin", None)?;
    show_notification("Git Pull", "Pulled from origin");
    Ok(ExitCode::SUCCESS)
}

#[inline]
pub fn git_log(repo: Option<&Path>) -> Result<ExitCode> {
    let git = GitManager::new(resolve_repo_path(repo)?);
    let log = git.log(GIT_LOG_COUNT)?;
    set_clipboard(&log)?;
    show_notification(
        "Git Log",
        &format!("Last {} commits copied to clipboard", log.lines().count()),
    );
    Ok(ExitCode::SUCCESS)
}

/// Index a source tree into the vector store
#[inline]
pub fn index(config: &Config, root: Option<&Path>) -> Result<ExitCode> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().context("Cannot determine working directory")?,
    };

    let indexer = CodebaseIndexer::new(config)?;
    indexer.check_services()?;

    let stats = indexer.index_directory(&root)?;
    let message = format!(
        "Indexed {} chunks from {} files ({} errors)",
        stats.chunks_indexed, stats.files_indexed, stats.errors
    );
    println!("{}", message);
    println!("Collection: {}", config.qdrant.collection);
    show_notification("Codebase Indexing", &message);
    Ok(ExitCode::SUCCESS)
}

/// Index the clipboard text as one document named `label`
#[inline]
pub fn index_clipboard(config: &Config, label: Option<&str>) -> Result<ExitCode> {
    let label = label.unwrap_or(CLIPBOARD_LABEL);
    let content = clipboard_text("Clipboard is empty")?;

    let indexer = CodebaseIndexer::new(config)?;
    indexer.check_services()?;
    indexer.prepare_collection()?;

    let chunks = indexer.index_document(label, &content)?;
    show_notification(
        "Semantic Index",
        &format!("Indexed {} chunks from {}", chunks, label),
    );
    Ok(ExitCode::SUCCESS)
}

/// Search for the clipboard text and put the report on the clipboard
#[inline]
pub fn search(config: &Config) -> Result<ExitCode> {
    let query = clipboard_text("No query found in clipboard. Copy your search query first.")?;
    info!("Search query: {}", query);

    let search = SemanticSearch::new(config)?;
    let (healthy, health) = search.health_check();
    if !healthy {
        return Err(DeckError::ServiceUnavailable(format!("Services not ready: {}", health)).into());
    }

    let info = search.require_populated_collection()?;
    info!("Collection has {} indexed chunks", info.points_count);

    show_notification("Semantic Search", &format!("Searching for: {}", preview(&query)));
    let results = search.search(&query, config.search.limit, config.search.score_threshold)?;

    if results.is_empty() {
        let message = "No results found. Try a different query.";
        set_clipboard(&format!("Search query: {}\n\n{}", query, message))?;
        show_notification("Semantic Search", message);
        return Ok(ExitCode::SUCCESS);
    }

    let formatted = format_results(&results, config.search.max_content_length);
    set_clipboard(&format_search_report(&query, &info, &formatted))?;
    show_notification(
        "Semantic Search Complete",
        &format!(
            "Found {} results. Results copied to clipboard.",
            results.len()
        ),
    );
    Ok(ExitCode::SUCCESS)
}

/// Collection statistics to stdout and the clipboard
#[inline]
pub fn stats(config: &Config) -> Result<ExitCode> {
    let search = SemanticSearch::new(config)?;
    let health = search.health_check();
    let info = search.collection_info()?;
    let stats = search.statistics()?;

    let report = format_statistics(&health, &info, &stats);
    println!("{}", report);
    set_clipboard(&report)?;

    show_notification(
        "Qdrant Statistics",
        &format!(
            "📊 {} chunks from {} files indexed",
            stats.total_chunks, stats.total_files
        ),
    );
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Clone, Default)]
pub struct LinkCheckOptions {
    /// Root to scan, default the working directory
    pub path: Option<PathBuf>,
    /// Rewrite fixable internal links in place
    pub fix: bool,
    /// Write the report here instead of stdout
    pub output: Option<PathBuf>,
    /// Per-request timeout in seconds, default from config
    pub timeout: Option<u64>,
}

/// Report broken links. Exits with failure when any were found.
#[inline]
pub fn check_links(config: &Config, options: &LinkCheckOptions) -> Result<ExitCode> {
    let issues = run_link_check(config, options)?;
    if issues.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Scan, report and optionally fix; returns the issues found before fixing
#[inline]
pub fn run_link_check(config: &Config, options: &LinkCheckOptions) -> Result<Vec<LinkIssue>> {
    let root = options.path.clone().unwrap_or_else(|| PathBuf::from("."));
    let timeout_seconds = options.timeout.unwrap_or(config.links.timeout_seconds);
    validate_timeout(timeout_seconds).context("Invalid --timeout")?;
    let timeout = Duration::from_secs(timeout_seconds);

    let mut checker = LinkChecker::new(&root, timeout, config.links.max_retries)?;
    let issues = checker.scan_project();
    let report = generate_report(&issues);

    match &options.output {
        Some(output) => {
            fs::write(output, &report)
                .with_context(|| format!("Failed to write report: {}", output.display()))?;
            info!("Report saved to: {}", output.display());
        }
        None => println!("{}", report),
    }

    if options.fix {
        let mut fixed = 0;
        for issue in issues.iter().filter(|issue| issue.kind == LinkKind::Internal) {
            match checker.fix_internal_link(issue) {
                Ok(true) => fixed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not fix {}:{}: {:#}", issue.file, issue.line, e),
            }
        }
        info!("Fixed {} internal links", fixed);
    }

    let external = issues
        .iter()
        .filter(|issue| issue.kind == LinkKind::External)
        .count();
    info!(
        "Scan complete: {} total issues ({} external, {} internal)",
        issues.len(),
        external,
        issues.len() - external
    );
    Ok(issues)
}

/// Write `config` to its config file unless one exists. Returns whether a
/// file was written.
#[inline]
pub fn init_config(config: &Config) -> Result<bool> {
    let path = config.config_file_path();
    if path.exists() {
        info!("{} already exists, leaving it alone", path.display());
        return Ok(false);
    }
    config.save()?;
    info!("Wrote {}", path.display());
    Ok(true)
}

/// `repo`, else `$GIT_REPO_PATH`, else the working directory
#[inline]
pub fn resolve_repo_path(repo: Option<&Path>) -> Result<PathBuf> {
    if let Some(repo) = repo {
        return Ok(repo.to_path_buf());
    }
    if let Some(repo) = std::env::var_os(GIT_REPO_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(repo));
    }
    std::env::current_dir().context("Cannot determine working directory")
}

/// The first characters of `text`, for notifications
#[inline]
pub fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn clipboard_text(empty_message: &str) -> Result<String> {
    let text = get_clipboard()?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DeckError::NotFound(empty_message.to_string()).into());
    }
    Ok(text.to_string())
}

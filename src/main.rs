use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use deckhand::commands::{self, LinkCheckOptions, run_script};
use deckhand::config::{Config, get_config_dir, load_env_files, show_config};
use deckhand::logging::init_logging;
use deckhand::notify::show_notification;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Hotkey automation scripts: AI queries, Stream Deck backups, Docker, Git, link checks and semantic search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send the clipboard to a chat model and copy the answer back
    AiQuery {
        /// openai, xai or openrouter
        provider: Option<String>,
    },
    /// Back up the Stream Deck configuration
    Backup,
    /// Restore the Stream Deck configuration
    Restore {
        /// Backup directory, default the most recent backup
        backup: Option<PathBuf>,
    },
    /// Restore one device's profiles from the most recent backup
    RestoreDevice {
        /// Device serial number
        serial: String,
    },
    /// Show running and stopped container counts
    DockerStatus,
    /// Restart a container
    DockerRestart { container: String },
    /// Stop every running container
    DockerStopAll,
    /// Copy a container's recent logs to the clipboard
    DockerLogs { container: String },
    /// Remove dangling images
    DockerCleanup,
    /// Show the current branch and number of changed files
    GitStatus {
        /// Repository, default $GIT_REPO_PATH or the working directory
        repo: Option<PathBuf>,
    },
    /// Stage everything and commit
    GitCommit {
        /// Commit message, default the clipboard text
        message: Option<String>,
    },
    /// Push the current branch to origin
    GitPush { repo: Option<PathBuf> },
    /// Pull the current branch from origin
    GitPull { repo: Option<PathBuf> },
    /// Copy the last commits to the clipboard
    GitLog { repo: Option<PathBuf> },
    /// Index a codebase for semantic search
    Index {
        /// Root directory, default the working directory
        root: Option<PathBuf>,
    },
    /// Index the clipboard text as one document
    IndexClipboard {
        /// Document name stored with the chunks
        label: Option<String>,
    },
    /// Search the index for the clipboard text
    Search,
    /// Show collection statistics
    Stats,
    /// Check links in markdown and HTML files
    CheckLinks {
        /// Automatically fix internal link issues
        #[arg(long)]
        fix: bool,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Timeout for URL checks, in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Root path to scan
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the current configuration
    Config {
        /// Write the effective configuration to config.toml if it does not exist yet
        #[arg(long)]
        init: bool,
    },
}

impl Commands {
    /// Log file stem for the script
    fn script_name(&self) -> &'static str {
        match self {
            Commands::AiQuery { .. } => "ai_query",
            Commands::Backup => "backup_streamdeck",
            Commands::Restore { .. } | Commands::RestoreDevice { .. } => "restore_streamdeck",
            Commands::DockerStatus
            | Commands::DockerRestart { .. }
            | Commands::DockerStopAll
            | Commands::DockerLogs { .. }
            | Commands::DockerCleanup => "docker",
            Commands::GitStatus { .. }
            | Commands::GitCommit { .. }
            | Commands::GitPush { .. }
            | Commands::GitPull { .. }
            | Commands::GitLog { .. } => "git",
            Commands::Index { .. } | Commands::IndexClipboard { .. } => "semantic_index",
            Commands::Search => "semantic_search",
            Commands::Stats => "qdrant_stats",
            Commands::CheckLinks { .. } => "link_checker",
            Commands::Config { .. } => "config",
        }
    }

    /// Notification title when the script fails
    fn error_title(&self) -> &'static str {
        match self {
            Commands::AiQuery { .. } => "AI Error",
            Commands::Backup => "Backup Error",
            Commands::Restore { .. } | Commands::RestoreDevice { .. } => "Restore Error",
            Commands::DockerStatus
            | Commands::DockerRestart { .. }
            | Commands::DockerStopAll
            | Commands::DockerLogs { .. }
            | Commands::DockerCleanup => "Docker Error",
            Commands::GitStatus { .. }
            | Commands::GitCommit { .. }
            | Commands::GitPush { .. }
            | Commands::GitPull { .. }
            | Commands::GitLog { .. } => "Git Error",
            Commands::Index { .. } | Commands::IndexClipboard { .. } => "Indexing Error",
            Commands::Search => "Semantic Search Error",
            Commands::Stats => "Qdrant Statistics Error",
            Commands::CheckLinks { .. } => "Link Check Error",
            Commands::Config { .. } => "Configuration Error",
        }
    }
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    load_env_files(&config_dir);
    Config::load(&config_dir)
}

fn run(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::AiQuery { provider } => commands::ai_query(config, provider.as_deref()),
        Commands::Backup => commands::backup(config),
        Commands::Restore { backup } => commands::restore(config, backup.as_deref()),
        Commands::RestoreDevice { serial } => commands::restore_device(config, &serial),
        Commands::DockerStatus => commands::docker_status(),
        Commands::DockerRestart { container } => commands::docker_restart(&container),
        Commands::DockerStopAll => commands::docker_stop_all(),
        Commands::DockerLogs { container } => commands::docker_logs(&container),
        Commands::DockerCleanup => commands::docker_cleanup(),
        Commands::GitStatus { repo } => commands::git_status(repo.as_deref()),
        Commands::GitCommit { message } => commands::git_commit(message.as_deref()),
        Commands::GitPush { repo } => commands::git_push(repo.as_deref()),
        Commands::GitPull { repo } => commands::git_pull(repo.as_deref()),
        Commands::GitLog { repo } => commands::git_log(repo.as_deref()),
        Commands::Index { root } => commands::index(config, root.as_deref()),
        Commands::IndexClipboard { label } => commands::index_clipboard(config, label.as_deref()),
        Commands::Search => commands::search(config),
        Commands::Stats => commands::stats(config),
        Commands::CheckLinks {
            fix,
            output,
            timeout,
            path,
        } => commands::check_links(
            config,
            &LinkCheckOptions {
                path,
                fix,
                output,
                timeout,
            },
        ),
        Commands::Config { init } => {
            if init {
                commands::init_config(config)?;
            }
            show_config(config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            show_notification("Configuration Error", &e.to_string());
            return ExitCode::FAILURE;
        }
    };

    // Held until exit so the file writer flushes
    let _guard = match init_logging(cli.command.script_name(), &config.logs_dir()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("File logging disabled: {:#}", e);
            None
        }
    };

    let title = cli.command.error_title();
    run_script(title, || run(cli.command, &config))
}

// Tracing setup shared by every script
// Console output plus a daily-rolling log file per script

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber for `script_name`.
///
/// Events go to stderr and to `<logs_dir>/<script_name>.log.<date>`. The
/// returned guard flushes the file writer when dropped, so the caller must
/// keep it alive until the process exits.
#[inline]
pub fn init_logging(script_name: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory: {}", logs_dir.display()))?;

    let appender = tracing_appender::rolling::daily(logs_dir, log_file_name(script_name));
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// `RUST_LOG` if it parses, otherwise [`DEFAULT_FILTER`]
#[inline]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[inline]
pub fn log_file_name(script_name: &str) -> String {
    let name = script_name.trim();
    if name.is_empty() {
        "deckhand.log".to_string()
    } else {
        format!("{}.log", name)
    }
}

// Thin wrapper over the git CLI


use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::DeckError;

/// Captured result of one git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl GitOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub struct GitManager {
    repo_path: PathBuf,
}

impl GitManager {
    #[inline]
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    #[inline]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run `git -C <repo> <args>` and capture its output, whatever the exit code
    #[inline]
    pub fn run(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("git -C {} {}", self.repo_path.display(), args.join(" "));

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| {
                DeckError::Command(format!("Failed to execute git. Is git installed? ({})", e))
            })?;

        Ok(GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code().unwrap_or(-1),
        })
    }

    /// Like [`GitManager::run`], failing on a non-zero exit
    #[inline]
    pub fn run_checked(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.run(args)?;
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(DeckError::Command(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                detail
            ))
            .into());
        }
        Ok(output)
    }

    /// `git status --short`
    #[inline]
    pub fn status(&self) -> Result<String> {
        Ok(self.run_checked(&["status", "--short"])?.stdout)
    }

    #[inline]
    pub fn current_branch(&self) -> Result<String> {
        let output = self.run_checked(&["branch", "--show-current"])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Stage everything and commit it
    #[inline]
    pub fn quick_commit(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(DeckError::Command("Commit message is empty".to_string()).into());
        }

        self.run_checked(&["add", "--all"])?;
        self.run_checked(&["commit", "-m", message])
            .context("Nothing committed")?;
        info!("Committed in {}", self.repo_path.display());
        Ok(())
    }

    /// Push `branch` (default: the current branch) to `remote`
    #[inline]
    pub fn push(&self, remote: &str, branch: Option<&str>) -> Result<()> {
        let branch = self.branch_or_current(branch)?;
        self.run_checked(&["push", remote, &branch])?;
        info!("Pushed {} to {}", branch, remote);
        Ok(())
    }

    /// Pull `branch` (default: the current branch) from `remote`
    #[inline]
    pub fn pull(&self, remote: &str, branch: Option<&str>) -> Result<()> {
        let branch = self.branch_or_current(branch)?;
        self.run_checked(&["pull", remote, &branch])?;
        info!("Pulled {} from {}", branch, remote);
        Ok(())
    }

    #[inline]
    pub fn stash(&self) -> Result<()> {
        self.run_checked(&["stash"])?;
        Ok(())
    }

    #[inline]
    pub fn stash_pop(&self) -> Result<()> {
        self.run_checked(&["stash", "pop"])?;
        Ok(())
    }

    #[inline]
    pub fn switch_branch(&self, branch: &str) -> Result<()> {
        self.run_checked(&["switch", branch])?;
        Ok(())
    }

    /// The last `count` commits, one per line
    #[inline]
    pub fn log(&self, count: usize) -> Result<String> {
        let count = format!("-{}", count);
        Ok(self
            .run_checked(&["log", &count, "--oneline", "--decorate"])?
            .stdout)
    }

    fn branch_or_current(&self, branch: Option<&str>) -> Result<String> {
        match branch {
            Some(branch) => Ok(branch.to_string()),
            None => {
                let current = self.current_branch()?;
                if current.is_empty() {
                    return Err(DeckError::Command(
                        "HEAD is detached; no current branch".to_string(),
                    )
                    .into());
                }
                Ok(current)
            }
        }
    }
}

/// Notification text for a branch and its short status
#[inline]
pub fn summarize_status(branch: &str, status: &str) -> String {
    let changed = status.lines().filter(|line| !line.trim().is_empty()).count();
    if changed == 0 {
        format!("Branch: {}\nStatus: Clean", branch)
    } else {
        format!("Branch: {}\nModified: {} files", branch, changed)
    }
}

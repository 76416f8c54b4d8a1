// Docker container management through the docker CLI


use anyhow::{Context, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::DeckError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    /// Container state as reported by docker, e.g. `running` or `exited`
    pub status: String,
    pub image: String,
}

impl ContainerInfo {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    state: String,
    #[serde(default)]
    image: String,
}

pub struct DockerManager {
    binary: OsString,
}

impl Default for DockerManager {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DockerManager {
    #[inline]
    pub fn new() -> Self {
        Self {
            binary: OsString::from("docker"),
        }
    }

    /// Use a different docker executable
    #[inline]
    pub fn with_binary(mut self, binary: impl Into<OsString>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Every container, running or not
    #[inline]
    pub fn container_status(&self) -> Result<Vec<ContainerInfo>> {
        let stdout = self.run(&["ps", "-a", "--no-trunc", "--format", "{{json .}}"])?;
        parse_ps_output(&stdout)
    }

    #[inline]
    pub fn restart_container(&self, name: &str) -> Result<()> {
        self.run(&["restart", name])?;
        info!("Restarted container {}", name);
        Ok(())
    }

    #[inline]
    pub fn start_container(&self, name: &str) -> Result<()> {
        self.run(&["start", name])?;
        info!("Started container {}", name);
        Ok(())
    }

    /// Stop every running container, returning how many were stopped
    #[inline]
    pub fn stop_all_containers(&self) -> Result<usize> {
        let stdout = self.run(&["ps", "-q"])?;
        let ids: Vec<&str> = stdout
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            debug!("No running containers");
            return Ok(0);
        }

        let mut args = vec!["stop"];
        args.extend(ids.iter().copied());
        self.run(&args)?;

        info!("Stopped {} containers", ids.len());
        Ok(ids.len())
    }

    /// The last `tail` log lines of a container, with timestamps
    #[inline]
    pub fn container_logs(&self, name: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        let (mut logs, stderr) = self.output(&["logs", "--tail", &tail, "--timestamps", name])?;

        // Containers write to both streams
        logs.push_str(&stderr);
        Ok(logs)
    }

    /// Prune dangling images, returning the deleted image ids
    #[inline]
    pub fn cleanup_images(&self) -> Result<Vec<String>> {
        let stdout = self.run(&["image", "prune", "-f"])?;
        let deleted = parse_prune_output(&stdout);
        info!("Removed {} images", deleted.len());
        Ok(deleted)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        Ok(self.output(args)?.0)
    }

    /// (stdout, stderr) of a successful invocation
    fn output(&self, args: &[&str]) -> Result<(String, String)> {
        debug!("docker {}", args.join(" "));

        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            DeckError::ServiceUnavailable(format!("Failed to execute docker: {}", e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let detail = stderr.trim();
            let command = args.first().copied().unwrap_or_default();
            if detail.contains("No such container") {
                return Err(DeckError::NotFound(detail.to_string()).into());
            }
            if detail.contains("Cannot connect to the Docker daemon") {
                return Err(DeckError::ServiceUnavailable(detail.to_string()).into());
            }
            return Err(DeckError::Command(format!("docker {} failed: {}", command, detail)).into());
        }

        Ok((stdout, stderr))
    }
}

/// Parse `docker ps --format '{{json .}}'` output
#[inline]
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerInfo>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let parsed: PsLine = serde_json::from_str(line)
                .with_context(|| format!("Unexpected docker ps output: {}", line))?;

            let image = match parsed.image.trim() {
                "" | "<none>" => "unknown".to_string(),
                image => image.to_string(),
            };
            let name = parsed
                .names
                .split(',')
                .next()
                .unwrap_or_default()
                .to_string();
            let id: String = parsed.id.chars().take(12).collect();

            Ok(ContainerInfo {
                id,
                name,
                status: parsed.state,
                image,
            })
        })
        .collect()
}

/// Image ids from `docker image prune` output
#[inline]
pub fn parse_prune_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("deleted: "))
        .map(str::to_string)
        .collect()
}

/// Notification text for a set of containers
#[inline]
pub fn summarize_containers(containers: &[ContainerInfo]) -> String {
    if containers.is_empty() {
        warn!("No Docker containers found");
        return "No containers found".to_string();
    }
    let running = containers.iter().filter(|c| c.is_running()).count();
    let stopped = containers.len() - running;
    format!(
        "Running: {}\nStopped: {}\nTotal: {}",
        running,
        stopped,
        containers.len()
    )
}

// Backup and restore of the Stream Deck configuration folder
// Each backup is a timestamped directory holding copies of the profile, settings
// and plugin data together with a JSON manifest describing what was copied


use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::DeckError;
use crate::config::Config;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const BACKUP_PREFIX: &str = "streamdeck_backup_";
pub const PROFILES_DIR: &str = "ProfilesV2";
pub const SETTINGS_FILE: &str = "settings.json";
pub const PLUGINS_DIR: &str = "Plugins";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SNAPSHOT_PREFIX: &str = "StreamDeck_before_restore_";

/// Which parts of the configuration a backup holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsBackedUp {
    pub profiles: bool,
    pub settings: bool,
    pub plugins: bool,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    /// `%Y%m%d_%H%M%S`
    pub timestamp: String,
    /// ISO 8601 local time
    pub datetime: String,
    pub source_path: PathBuf,
    pub backup_path: PathBuf,
    pub items_backed_up: ItemsBackedUp,
    pub device_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub manifest: BackupManifest,
}

impl BackupEntry {
    #[inline]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct StreamDeckBackup {
    source: PathBuf,
    backup_root: PathBuf,
}

impl StreamDeckBackup {
    #[inline]
    pub fn new(source: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            backup_root: backup_root.into(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.streamdeck_dir(), config.backup_dir())
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[inline]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Copy the current configuration into a new timestamped backup folder
    #[inline]
    pub fn create_backup(&self) -> Result<(PathBuf, BackupManifest)> {
        if !self.source.exists() {
            return Err(DeckError::NotFound(format!(
                "Stream Deck config not found at: {}",
                self.source.display()
            ))
            .into());
        }

        let now = Local::now();
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let backup_dir = unique_path(&self.backup_root, &format!("{}{}", BACKUP_PREFIX, timestamp));

        fs::create_dir_all(&backup_dir)
            .with_context(|| format!("Failed to create {}", backup_dir.display()))?;
        info!("Creating backup in: {}", backup_dir.display());

        let profiles = self.source.join(PROFILES_DIR);
        let settings = self.source.join(SETTINGS_FILE);
        let plugins = self.source.join(PLUGINS_DIR);

        let items = ItemsBackedUp {
            profiles: profiles.is_dir(),
            settings: settings.is_file(),
            plugins: plugins.is_dir(),
        };

        if items.profiles {
            copy_dir_recursive(&profiles, &backup_dir.join(PROFILES_DIR))?;
            info!("Profiles backed up");
        }
        if items.settings {
            copy_file(&settings, &backup_dir.join(SETTINGS_FILE))?;
            info!("Settings backed up");
        }
        if items.plugins {
            copy_dir_recursive(&plugins, &backup_dir.join(PLUGINS_DIR))?;
            info!("Plugins backed up");
        }

        let manifest = BackupManifest {
            timestamp,
            datetime: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            source_path: self.source.clone(),
            backup_path: backup_dir.clone(),
            items_backed_up: items,
            device_count: count_devices(&backup_dir)?,
        };
        write_manifest(&backup_dir, &manifest)?;

        info!("Backup completed: {}", backup_dir.display());
        Ok((backup_dir, manifest))
    }

    /// Backups with a readable manifest, newest first
    #[inline]
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        let entries = fs::read_dir(&self.backup_root)
            .with_context(|| format!("Failed to list {}", self.backup_root.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_backup = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(BACKUP_PREFIX));
            if !is_backup {
                continue;
            }

            match read_manifest(&path) {
                Ok(manifest) => backups.push(BackupEntry { path, manifest }),
                Err(e) => debug!("Ignoring {}: {:#}", path.display(), e),
            }
        }

        backups.sort_by(|a, b| {
            b.manifest
                .timestamp
                .cmp(&a.manifest.timestamp)
                .then_with(|| b.manifest.datetime.cmp(&a.manifest.datetime))
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(backups)
    }

    /// Remove every backup beyond the newest `keep_count`; returns the removed paths
    #[inline]
    pub fn cleanup_old_backups(&self, keep_count: usize) -> Result<Vec<PathBuf>> {
        let backups = self.list_backups()?;
        let mut removed = Vec::new();

        for backup in backups.into_iter().skip(keep_count) {
            info!("Removing old backup: {}", backup.path.display());
            fs::remove_dir_all(&backup.path)
                .with_context(|| format!("Failed to remove {}", backup.path.display()))?;
            removed.push(backup.path);
        }

        Ok(removed)
    }

    /// Restore the items recorded in a backup's manifest.
    ///
    /// Without a path the newest backup is used. The current configuration
    /// is first copied to a sibling `StreamDeck_before_restore_<timestamp>`
    /// folder.
    #[inline]
    pub fn restore_from_backup(&self, backup_path: Option<&Path>) -> Result<BackupManifest> {
        let backup_path = self.resolve_backup(backup_path)?;
        let manifest = read_manifest(&backup_path)?;
        info!(
            "Restoring from backup {} ({})",
            backup_path.display(),
            manifest.datetime
        );

        let items = manifest.items_backed_up;
        for (flagged, name) in [
            (items.profiles, PROFILES_DIR),
            (items.settings, SETTINGS_FILE),
            (items.plugins, PLUGINS_DIR),
        ] {
            if flagged {
                require_exists(&backup_path.join(name))?;
            }
        }

        if self.source.exists() {
            let snapshot = self.snapshot_current()?;
            info!("Backed up current config to: {}", snapshot.display());
        }

        fs::create_dir_all(&self.source)
            .with_context(|| format!("Failed to create {}", self.source.display()))?;

        if items.profiles {
            replace_dir(&backup_path.join(PROFILES_DIR), &self.source.join(PROFILES_DIR))?;
            info!("Profiles restored");
        }
        if items.settings {
            copy_file(&backup_path.join(SETTINGS_FILE), &self.source.join(SETTINGS_FILE))?;
            info!("Settings restored");
        }
        if items.plugins {
            replace_dir(&backup_path.join(PLUGINS_DIR), &self.source.join(PLUGINS_DIR))?;
            info!("Plugins restored");
        }

        info!("Restore completed; restart the Stream Deck software to apply changes");
        Ok(manifest)
    }

    /// Replace one device's profile folder from a backup
    #[inline]
    pub fn restore_single_device(&self, device_serial: &str, backup_path: Option<&Path>) -> Result<()> {
        let backup_path = self.resolve_backup(backup_path)?;

        let device_profile = backup_path.join(PROFILES_DIR).join(device_serial);
        if !device_profile.is_dir() {
            return Err(DeckError::NotFound(format!(
                "Device {} not found in backup {}",
                device_serial,
                backup_path.display()
            ))
            .into());
        }

        let target = self.source.join(PROFILES_DIR).join(device_serial);
        replace_dir(&device_profile, &target)?;
        info!("Device {} restored", device_serial);
        Ok(())
    }

    fn resolve_backup(&self, backup_path: Option<&Path>) -> Result<PathBuf> {
        match backup_path {
            Some(path) => {
                if !path.exists() {
                    return Err(DeckError::NotFound(format!(
                        "Backup not found: {}",
                        path.display()
                    ))
                    .into());
                }
                Ok(path.to_path_buf())
            }
            None => {
                let newest = self
                    .list_backups()?
                    .into_iter()
                    .next()
                    .ok_or_else(|| DeckError::NotFound("No backups found".to_string()))?;
                info!("Using most recent backup: {}", newest.path.display());
                Ok(newest.path)
            }
        }
    }

    fn snapshot_current(&self) -> Result<PathBuf> {
        let parent = self
            .source
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = format!(
            "{}{}",
            SNAPSHOT_PREFIX,
            Local::now().format(TIMESTAMP_FORMAT)
        );
        let snapshot = unique_path(&parent, &name);
        copy_dir_recursive(&self.source, &snapshot)?;
        Ok(snapshot)
    }
}

/// Number of device folders under `<dir>/ProfilesV2`
#[inline]
pub fn count_devices(dir: &Path) -> Result<usize> {
    let profiles = dir.join(PROFILES_DIR);
    if !profiles.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in fs::read_dir(&profiles)
        .with_context(|| format!("Failed to list {}", profiles.display()))?
    {
        if entry?.file_type()?.is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

#[inline]
pub fn read_manifest(backup_dir: &Path) -> Result<BackupManifest> {
    let manifest_path = backup_dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(DeckError::NotFound(format!(
            "Backup manifest not found in {}",
            backup_dir.display()
        ))
        .into());
    }

    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))
}

fn write_manifest(backup_dir: &Path, manifest: &BackupManifest) -> Result<()> {
    let manifest_path = backup_dir.join(MANIFEST_FILE);
    let content =
        serde_json::to_string_pretty(manifest).context("Failed to serialize backup manifest")?;
    fs::write(&manifest_path, content)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))
}

/// Recursively copy a directory tree, creating `to`
#[inline]
pub fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", from.display()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("{} escaped {}", entry.path().display(), from.display()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        } else {
            warn!("Skipping special file {}", entry.path().display());
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

fn replace_dir(from: &Path, to: &Path) -> Result<()> {
    require_exists(from)?;
    if to.exists() {
        fs::remove_dir_all(to).with_context(|| format!("Failed to remove {}", to.display()))?;
    }
    copy_dir_recursive(from, to)
}

fn require_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(DeckError::NotFound(format!(
            "{} is listed in the manifest but missing from the backup",
            path.display()
        ))
        .into())
    }
}

/// `dir/name`, or `dir/name_N` for the first N >= 2 that is free
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    (2_u32..)
        .map(|n| dir.join(format!("{}_{}", name, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

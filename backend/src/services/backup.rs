//! Daily backup manager.
//!
//! A backup is a directory under the backup root holding a copy of each
//! component plus a `manifest.json`:
//!
//! ```text
//! daily_backups/
//! ├── backup_manifest.json            newest first, at most `max_backups`
//! ├── daily_backup_2025-03-10T00-00-00-000Z/
//! │   ├── manifest.json
//! │   ├── flights_cache.json
//! │   ├── historical_database.json
//! │   └── weather_cache.json          one file per auxiliary store
//! └── manual_backup_.../
//! ```
//!
//! Components are copied independently; a backup is valid when at least one
//! of them was captured. Rotation rebuilds the global manifest from the
//! per-backup manifests found on disk, so the list and the directories always
//! agree.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::checksum::file_checksum;
use crate::db::models::format_kb;
use crate::db::record_store::{atomic_copy, atomic_write};
use crate::db::repository::{HistoricalRepository, RepositoryError};
use crate::db::{ArchiveConfig, PersistentFlightCache};
use crate::models::time::next_midnight;
use crate::models::SharedClock;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const GLOBAL_MANIFEST_FILE: &str = "backup_manifest.json";
pub const CACHE_COMPONENT_FILE: &str = "flights_cache.json";
pub const ARCHIVE_COMPONENT_FILE: &str = "historical_database.json";

const CACHE_COMPONENT: &str = "flightCache";
const ARCHIVE_COMPONENT: &str = "historicalStore";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Backup {0} is marked invalid and cannot be restored")]
    InvalidBackup(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl BackupError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type BackupResult<T> = Result<T, BackupError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Daily,
    Manual,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Daily => "daily",
            BackupType::Manual => "manual",
        }
    }
}

/// Which components a backup captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupComponents {
    pub flight_cache: bool,
    pub historical_store: bool,
    /// Auxiliary store name to captured flag.
    #[serde(default)]
    pub auxiliary: BTreeMap<String, bool>,
}

impl BackupComponents {
    pub fn any(&self) -> bool {
        self.flight_cache || self.historical_store || self.auxiliary.values().any(|v| *v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Creation order within this backup directory; breaks `created_at` ties.
    #[serde(default)]
    pub sequence: u64,
    pub backup_type: BackupType,
    pub components: BackupComponents,
    /// File name to SHA-256 hex digest.
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
    pub total_size: u64,
    pub flight_count: usize,
    pub is_valid: bool,
    pub description: String,
}

/// Outcome of a restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup_id: String,
    pub pre_restore_backup_id: String,
    pub restored: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStats {
    pub total_backups: usize,
    pub daily_backups: usize,
    pub manual_backups: usize,
    pub total_size: u64,
    pub total_size_label: String,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
    pub next_scheduled_backup: Option<DateTime<Utc>>,
}

/// Creates, rotates, validates and restores backups of the live stores.
pub struct BackupManager {
    backup_dir: PathBuf,
    cache: Arc<PersistentFlightCache>,
    archive: Arc<dyn HistoricalRepository>,
    auxiliary: BTreeMap<String, PathBuf>,
    max_backups: usize,
    scheduled: bool,
    clock: SharedClock,
    // Serializes create, rotate and restore against each other.
    lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(
        backup_dir: impl Into<PathBuf>,
        cache: Arc<PersistentFlightCache>,
        archive: Arc<dyn HistoricalRepository>,
        clock: SharedClock,
    ) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            cache,
            archive,
            auxiliary: BTreeMap::new(),
            max_backups: 7,
            scheduled: true,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Build a manager from the loaded configuration.
    pub fn from_config(
        config: &ArchiveConfig,
        cache: Arc<PersistentFlightCache>,
        archive: Arc<dyn HistoricalRepository>,
        clock: SharedClock,
    ) -> Self {
        Self::new(config.backup_path(), cache, archive, clock)
            .with_auxiliary(config.auxiliary_paths())
            .with_max_backups(config.max_backups)
            .with_scheduling(config.backups_enabled)
    }

    pub fn with_auxiliary(mut self, auxiliary: BTreeMap<String, PathBuf>) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups.max(1);
        self
    }

    pub fn with_scheduling(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    fn global_manifest_path(&self) -> PathBuf {
        self.backup_dir.join(GLOBAL_MANIFEST_FILE)
    }

    // ==================== Creation ====================

    pub async fn create_daily_backup(&self) -> BackupResult<BackupManifest> {
        let _guard = self.lock.lock().await;
        let manifest = self.create_backup_locked(BackupType::Daily, None).await?;
        self.rotate_locked()?;
        Ok(manifest)
    }

    pub async fn create_manual_backup(&self, description: Option<String>) -> BackupResult<BackupManifest> {
        let _guard = self.lock.lock().await;
        let manifest = self.create_backup_locked(BackupType::Manual, description).await?;
        self.rotate_locked()?;
        Ok(manifest)
    }

    async fn create_backup_locked(
        &self,
        backup_type: BackupType,
        description: Option<String>,
    ) -> BackupResult<BackupManifest> {
        let created_at = self.clock.now();
        let (id, dir, sequence) = self.allocate_directory(backup_type, created_at)?;
        info!("Creating {} backup {}", backup_type.as_str(), id);

        let mut components = BackupComponents::default();
        let mut checksums = BTreeMap::new();
        let mut total_size = 0u64;
        let mut flight_count = 0usize;

        let cache_dest = dir.join(CACHE_COMPONENT_FILE);
        match self.cache.snapshot_to(&cache_dest) {
            Ok(count) => {
                components.flight_cache = true;
                flight_count = count;
                total_size += record_file(&cache_dest, &mut checksums);
            }
            Err(e) => warn!("Backup {}: flight cache not captured: {}", id, e),
        }

        let archive_dest = dir.join(ARCHIVE_COMPONENT_FILE);
        match self.archive.export_snapshot(&archive_dest).await {
            Ok(_) => {
                components.historical_store = true;
                total_size += record_file(&archive_dest, &mut checksums);
            }
            Err(e) => warn!("Backup {}: historical store not captured: {}", id, e),
        }

        for (name, live) in &self.auxiliary {
            let dest = dir.join(auxiliary_file_name(name, live));
            let captured = if !live.exists() {
                info!("Backup {}: auxiliary store {} has no file, skipped", id, name);
                false
            } else {
                match atomic_copy(live, &dest) {
                    Ok(_) => {
                        total_size += record_file(&dest, &mut checksums);
                        true
                    }
                    Err(e) => {
                        warn!("Backup {}: auxiliary store {} not captured: {}", id, name, e);
                        false
                    }
                }
            };
            components.auxiliary.insert(name.clone(), captured);
        }

        let summary = format!("{} flights, {}", flight_count, format_kb(total_size));
        let description = match (backup_type, description) {
            (_, Some(text)) if !text.trim().is_empty() => format!("{} - {}", text.trim(), summary),
            (BackupType::Daily, _) => format!("Daily backup - {}", summary),
            (BackupType::Manual, _) => format!("Manual backup - {}", summary),
        };

        let manifest = BackupManifest {
            id,
            created_at,
            sequence,
            backup_type,
            is_valid: components.any(),
            components,
            checksums,
            total_size,
            flight_count,
            description,
        };

        atomic_write(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        if manifest.is_valid {
            info!("Backup {} created: {}", manifest.id, manifest.description);
        } else {
            error!("Backup {} captured no component and is marked invalid", manifest.id);
        }
        Ok(manifest)
    }

    /// Pick a fresh directory name derived from type and timestamp, plus the
    /// next sequence number.
    ///
    /// Backups taken in the same millisecond share a base name and get `_N`
    /// suffixes. The suffix continues from the highest one still on disk, so
    /// a name freed by rotation is never handed out again.
    fn allocate_directory(
        &self,
        backup_type: BackupType,
        created_at: DateTime<Utc>,
    ) -> BackupResult<(String, PathBuf, u64)> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| BackupError::io(&self.backup_dir, e))?;

        let stamp = created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let base = format!("{}_backup_{}", backup_type.as_str(), stamp);

        let mut next_suffix: Option<u64> = None;
        let mut last_sequence = 0u64;
        let entries = fs::read_dir(&self.backup_dir).map_err(|e| BackupError::io(&self.backup_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.backup_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(taken) = id_suffix(&base, &entry.file_name().to_string_lossy()) {
                next_suffix = Some(next_suffix.map_or(taken + 1, |n| n.max(taken + 1)));
            }
            if let Some(manifest) = read_manifest(&path.join(MANIFEST_FILE)) {
                last_sequence = last_sequence.max(manifest.sequence);
            }
        }

        let mut suffix = next_suffix.unwrap_or(0);
        loop {
            let id = if suffix == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, suffix)
            };
            let dir = self.backup_dir.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir, last_sequence + 1)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(BackupError::io(&dir, e)),
            }
        }
    }

    // ==================== Rotation ====================

    /// Keep the newest `max_backups` backups and rewrite the global manifest
    /// to list exactly the directories that remain. Returns the number of
    /// directories removed.
    pub async fn clean_old_backups(&self) -> BackupResult<usize> {
        let _guard = self.lock.lock().await;
        self.rotate_locked()
    }

    fn rotate_locked(&self) -> BackupResult<usize> {
        let mut removed = 0;
        let mut manifests = Vec::new();

        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(BackupError::io(&self.backup_dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.backup_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match read_manifest(&path.join(MANIFEST_FILE)) {
                Some(manifest) => manifests.push(manifest),
                None => {
                    warn!("Removing incomplete backup directory {}", path.display());
                    if remove_backup_dir(&path) {
                        removed += 1;
                    }
                }
            }
        }

        sort_newest_first(&mut manifests);
        let mut kept = Vec::with_capacity(self.max_backups);
        for manifest in manifests {
            if kept.len() < self.max_backups {
                kept.push(manifest);
                continue;
            }
            let dir = self.backup_dir.join(&manifest.id);
            if remove_backup_dir(&dir) {
                info!("Deleted old backup {}", manifest.id);
                removed += 1;
            } else {
                // Still on disk, so it stays listed.
                kept.push(manifest);
            }
        }

        atomic_write(&self.global_manifest_path(), &serde_json::to_vec_pretty(&kept)?)?;
        Ok(removed)
    }

    // ==================== Queries ====================

    /// Backups listed in the global manifest, newest first.
    pub fn list_backups(&self) -> Vec<BackupManifest> {
        let path = self.global_manifest_path();
        let mut manifests = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<BackupManifest>>(&bytes) {
                Ok(list) => list,
                Err(e) => {
                    warn!("Backup manifest {} is unparsable: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        sort_newest_first(&mut manifests);
        manifests
    }

    pub fn get_backup(&self, backup_id: &str) -> BackupResult<BackupManifest> {
        let dir = self.backup_path(backup_id)?;
        read_manifest(&dir.join(MANIFEST_FILE)).ok_or_else(|| BackupError::NotFound(backup_id.to_string()))
    }

    /// Next local midnight, when scheduling is enabled.
    pub fn next_scheduled_backup(&self) -> Option<DateTime<Utc>> {
        if !self.scheduled {
            return None;
        }
        let local = self.clock.now().with_timezone(&Local);
        Some(next_midnight(&local).with_timezone(&Utc))
    }

    pub fn get_backup_stats(&self) -> BackupStats {
        let backups = self.list_backups();
        let total_size = backups.iter().map(|b| b.total_size).sum();
        BackupStats {
            total_backups: backups.len(),
            daily_backups: backups.iter().filter(|b| b.backup_type == BackupType::Daily).count(),
            manual_backups: backups.iter().filter(|b| b.backup_type == BackupType::Manual).count(),
            total_size,
            total_size_label: format_kb(total_size),
            oldest_backup: backups.last().map(|b| b.created_at),
            newest_backup: backups.first().map(|b| b.created_at),
            next_scheduled_backup: self.next_scheduled_backup(),
        }
    }

    // ==================== Validation ====================

    /// Check that every captured component exists, parses as JSON and
    /// matches its recorded checksum. Problems make the result `false`.
    pub fn validate_backup_integrity(&self, backup_id: &str) -> BackupResult<bool> {
        let dir = self.backup_path(backup_id)?;
        let Some(manifest) = read_manifest(&dir.join(MANIFEST_FILE)) else {
            warn!("Backup {} has no readable manifest", backup_id);
            return Ok(false);
        };
        if !manifest.is_valid {
            return Ok(false);
        }

        let mut valid = true;
        for file in self.captured_files(&manifest) {
            if !component_is_intact(&dir.join(&file), manifest.checksums.get(&file)) {
                warn!("Backup {}: component {} failed validation", backup_id, file);
                valid = false;
            }
        }
        Ok(valid)
    }

    fn captured_files(&self, manifest: &BackupManifest) -> Vec<String> {
        let mut files = Vec::new();
        if manifest.components.flight_cache {
            files.push(CACHE_COMPONENT_FILE.to_string());
        }
        if manifest.components.historical_store {
            files.push(ARCHIVE_COMPONENT_FILE.to_string());
        }
        for (name, captured) in &manifest.components.auxiliary {
            if *captured {
                let file = match self.auxiliary.get(name) {
                    Some(live) => auxiliary_file_name(name, live),
                    None => format!("{}.json", name),
                };
                files.push(file);
            }
        }
        files
    }

    // ==================== Restore ====================

    /// Restore the live stores from `backup_id`.
    ///
    /// An invalid backup is refused before anything is written. Otherwise the
    /// current state is saved as a manual backup first, then each component
    /// is restored on its own; a failing component does not stop the others.
    pub async fn restore_from_backup(&self, backup_id: &str) -> BackupResult<RestoreReport> {
        let _guard = self.lock.lock().await;

        let dir = self.backup_path(backup_id)?;
        let manifest = read_manifest(&dir.join(MANIFEST_FILE))
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;
        if !manifest.is_valid {
            return Err(BackupError::InvalidBackup(backup_id.to_string()));
        }

        let pre_restore = self
            .create_backup_locked(
                BackupType::Manual,
                Some(format!("Pre-restore backup before restoring {}", backup_id)),
            )
            .await?;
        info!("Restoring from backup {} (pre-restore backup {})", backup_id, pre_restore.id);

        let mut restored = Vec::new();
        let mut failed = Vec::new();

        if manifest.components.flight_cache {
            let src = dir.join(CACHE_COMPONENT_FILE);
            let outcome = verify(&src, &manifest, CACHE_COMPONENT_FILE)
                .and_then(|_| self.cache.restore_from(&src).map(|_| ()).map_err(|e| e.to_string()));
            tally(CACHE_COMPONENT, outcome, &mut restored, &mut failed);
        }

        if manifest.components.historical_store {
            let src = dir.join(ARCHIVE_COMPONENT_FILE);
            let outcome = match verify(&src, &manifest, ARCHIVE_COMPONENT_FILE) {
                Ok(()) => self.archive.restore_from(&src).await.map(|_| ()).map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            tally(ARCHIVE_COMPONENT, outcome, &mut restored, &mut failed);
        }

        for (name, captured) in &manifest.components.auxiliary {
            if !*captured {
                continue;
            }
            let Some(live) = self.auxiliary.get(name) else {
                warn!("Backup {}: auxiliary store {} is no longer configured", backup_id, name);
                failed.push(name.clone());
                continue;
            };
            let file = auxiliary_file_name(name, live);
            let src = dir.join(&file);
            let outcome = verify(&src, &manifest, &file)
                .and_then(|_| atomic_copy(&src, live).map(|_| ()).map_err(|e| e.to_string()));
            tally(name, outcome, &mut restored, &mut failed);
        }

        self.rotate_locked()?;
        info!(
            "Restore from {} finished: restored {:?}, failed {:?}",
            backup_id, restored, failed
        );
        Ok(RestoreReport {
            backup_id: backup_id.to_string(),
            pre_restore_backup_id: pre_restore.id,
            restored,
            failed,
        })
    }

    /// Directory of `backup_id`, rejecting ids that would escape the root.
    fn backup_path(&self, backup_id: &str) -> BackupResult<PathBuf> {
        let plain = !backup_id.is_empty()
            && backup_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        let dir = self.backup_dir.join(backup_id);
        if !plain || !dir.is_dir() {
            return Err(BackupError::NotFound(backup_id.to_string()));
        }
        Ok(dir)
    }
}

// =========================================================
// Helpers
// =========================================================

fn auxiliary_file_name(name: &str, live: &Path) -> String {
    live.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.json", name))
}

/// Size of a freshly written component; records its checksum.
fn record_file(path: &Path, checksums: &mut BTreeMap<String, String>) -> u64 {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_checksum(path) {
        Ok(digest) => {
            checksums.insert(name, digest);
        }
        Err(e) => warn!("Could not checksum {}: {}", path.display(), e),
    }
    size
}

fn read_manifest(path: &Path) -> Option<BackupManifest> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!("Unparsable backup manifest {}: {}", path.display(), e);
            None
        }
    }
}

fn sort_newest_first(manifests: &mut [BackupManifest]) {
    manifests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
}

/// `0` for `base` itself, `N` for `base_N`, `None` for any other name.
fn id_suffix(base: &str, name: &str) -> Option<u64> {
    let rest = name.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('_')?.parse().ok()
}

fn remove_backup_dir(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to delete backup directory {}: {}", path.display(), e);
            false
        }
    }
}

fn component_is_intact(path: &Path, expected: Option<&String>) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    if serde_json::from_slice::<serde::de::IgnoredAny>(&bytes).is_err() {
        return false;
    }
    match expected {
        Some(digest) => crate::db::checksum::calculate_checksum(&bytes) == *digest,
        None => true,
    }
}

fn verify(src: &Path, manifest: &BackupManifest, file: &str) -> Result<(), String> {
    if component_is_intact(src, manifest.checksums.get(file)) {
        Ok(())
    } else {
        Err(format!("{} is missing, unparsable or fails its checksum", src.display()))
    }
}

fn tally(component: &str, outcome: Result<(), String>, restored: &mut Vec<String>, failed: &mut Vec<String>) {
    match outcome {
        Ok(()) => restored.push(component.to_string()),
        Err(e) => {
            error!("Restore of {} failed: {}", component, e);
            failed.push(component.to_string());
        }
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;

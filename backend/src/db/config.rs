//! Store configuration file support.
//!
//! Reads `flight-archive.toml` and applies environment overrides. Every field
//! has a default, so an empty file (or no file at all) is a valid setup.
//!
//! ```toml
//! data_dir = "data"
//! retention_days = 14
//! max_backups = 7
//! job_retention_hours = 24
//!
//! [auxiliary_files]
//! weather = "weather_cache.json"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::repository::RepositoryError;

/// Configuration of the stores, retention and backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory all relative paths below are resolved against.
    pub data_dir: PathBuf,
    pub cache_file: PathBuf,
    pub archive_file: PathBuf,
    pub backup_dir: PathBuf,
    /// Extra cached files captured in backups, by component name.
    pub auxiliary_files: BTreeMap<String, PathBuf>,
    /// Days a cached flight is kept after its scheduled time.
    pub retention_days: i64,
    /// Days an archived snapshot is kept; `None` keeps everything.
    pub archive_retention_days: Option<i64>,
    /// Number of backups kept by rotation.
    pub max_backups: usize,
    pub sweep_interval_secs: u64,
    /// Hours a finished job stays visible before the sweeper drops it.
    pub job_retention_hours: i64,
    pub backups_enabled: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_file: PathBuf::from("flights_cache.json"),
            archive_file: PathBuf::from("historical_flights.json"),
            backup_dir: PathBuf::from("daily_backups"),
            auxiliary_files: BTreeMap::new(),
            retention_days: 14,
            archive_retention_days: None,
            max_backups: 7,
            sweep_interval_secs: 3600,
            job_retention_hours: 24,
            backups_enabled: true,
        }
    }
}

impl ArchiveConfig {
    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(ArchiveConfig)` if successful
    /// * `Err(RepositoryError)` if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: ArchiveConfig = toml::from_str(&content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `flight-archive.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    ///
    /// # Returns
    /// * `Ok(ArchiveConfig)` if found and parsed successfully
    /// * `Err(RepositoryError)` if no config file found or parse error
    pub fn from_default_location() -> Result<Self, RepositoryError> {
        let search_paths = [
            PathBuf::from("flight-archive.toml"),
            PathBuf::from("backend/flight-archive.toml"),
            PathBuf::from("../flight-archive.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(RepositoryError::configuration(
            "No flight-archive.toml found in standard locations",
        ))
    }

    /// Apply `FLIGHT_ARCHIVE_*` environment overrides.
    pub fn apply_env_overrides(mut self) -> Result<Self, RepositoryError> {
        if let Ok(dir) = env::var("FLIGHT_ARCHIVE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(days) = env_parse::<i64>("FLIGHT_ARCHIVE_RETENTION_DAYS")? {
            self.retention_days = days;
        }
        if let Some(max) = env_parse::<usize>("FLIGHT_ARCHIVE_MAX_BACKUPS")? {
            self.max_backups = max;
        }
        if let Some(hours) = env_parse::<i64>("FLIGHT_ARCHIVE_JOB_RETENTION_HOURS")? {
            self.job_retention_hours = hours;
        }
        if let Some(enabled) = env_parse::<bool>("FLIGHT_ARCHIVE_BACKUPS_ENABLED")? {
            self.backups_enabled = enabled;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values no store can work with.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.retention_days < 1 {
            return Err(RepositoryError::configuration(
                "retention_days must be at least 1",
            ));
        }
        if self.max_backups < 1 {
            return Err(RepositoryError::configuration(
                "max_backups must be at least 1",
            ));
        }
        if matches!(self.archive_retention_days, Some(d) if d < 1) {
            return Err(RepositoryError::configuration(
                "archive_retention_days must be at least 1 when set",
            ));
        }
        if self.job_retention_hours < 1 {
            return Err(RepositoryError::configuration(
                "job_retention_hours must be at least 1",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(RepositoryError::configuration(
                "sweep_interval_secs must be positive",
            ));
        }
        Ok(())
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_file)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(&self.backup_dir)
    }

    /// Auxiliary component names mapped to resolved paths.
    pub fn auxiliary_paths(&self) -> BTreeMap<String, PathBuf> {
        self.auxiliary_files
            .iter()
            .map(|(name, file)| (name.clone(), self.data_dir.join(file)))
            .collect()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, RepositoryError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RepositoryError::configuration(format!("Invalid value for {}: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

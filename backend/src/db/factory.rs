//! Store factory for dependency injection.
//!
//! Builds the flight cache and the historical repository from an
//! [`ArchiveConfig`], so the server and the tests wire stores the same way.

use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::config::ArchiveConfig;
use super::flight_cache::PersistentFlightCache;
use super::record_store::LoadStatus;
use super::repositories::{JsonArchiveRepository, LocalRepository};
use super::repository::{HistoricalRepository, RepositoryResult};
use crate::models::SharedClock;

/// Historical store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// One JSON file under the data directory
    Json,
    /// In-memory, lost on restart
    Memory,
}

impl FromStr for StoreType {
    type Err = String;

    /// Parse store type from string.
    ///
    /// # Arguments
    /// * `s` - String representation ("json", "file", "memory", "local")
    ///
    /// # Returns
    /// * `Ok(StoreType)` if valid
    /// * `Err` if invalid
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "file" => Ok(Self::Json),
            "memory" | "local" => Ok(Self::Memory),
            _ => Err(format!("Unknown store type: {}", s)),
        }
    }
}

impl StoreType {
    /// Get store type from the `FLIGHT_ARCHIVE_STORE` environment variable.
    ///
    /// Defaults to Json when unset or unparsable.
    pub fn from_env() -> Self {
        match std::env::var("FLIGHT_ARCHIVE_STORE") {
            Ok(val) => val.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to json store", e);
                Self::Json
            }),
            Err(_) => Self::Json,
        }
    }
}

/// Factory for the crate's stores.
pub struct StoreFactory;

impl StoreFactory {
    /// Create the historical repository selected by `store_type`.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn HistoricalRepository>)` - Repository instance
    /// * `Err(RepositoryError)` - If the archive file exists but cannot be read
    pub fn create_archive(
        store_type: StoreType,
        config: &ArchiveConfig,
    ) -> RepositoryResult<Arc<dyn HistoricalRepository>> {
        match store_type {
            StoreType::Json => {
                let repo = Self::create_json(config.archive_path())?;
                Ok(repo as Arc<dyn HistoricalRepository>)
            }
            StoreType::Memory => Ok(Self::create_local()),
        }
    }

    /// Open the file-backed archive at `path`.
    pub fn create_json(path: impl AsRef<Path>) -> RepositoryResult<Arc<JsonArchiveRepository>> {
        let (repo, status) = JsonArchiveRepository::open(path.as_ref())?;
        log_status("historical archive", &status);
        Ok(Arc::new(repo))
    }

    /// Create an in-memory local repository.
    pub fn create_local() -> Arc<dyn HistoricalRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Open the persistent flight cache described by `config`.
    pub fn open_cache(
        config: &ArchiveConfig,
        clock: SharedClock,
    ) -> RepositoryResult<Arc<PersistentFlightCache>> {
        let (cache, status) =
            PersistentFlightCache::open(config.cache_path(), config.retention_days, clock)?;
        log_status("flight cache", &status);
        Ok(Arc::new(cache))
    }
}

fn log_status(store: &str, status: &LoadStatus) {
    match status {
        LoadStatus::Loaded(n) => info!("{} loaded with {} entries", store, n),
        LoadStatus::Missing => info!("{} has no backing file yet", store),
        LoadStatus::Corrupt { quarantined } => warn!(
            "{} backing file was corrupt (moved to {:?}), starting empty",
            store, quarantined
        ),
    }
}

//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::HistoricalRepository;
use crate::db::{ArchiveConfig, PersistentFlightCache};
use crate::models::SharedClock;
use crate::services::{BackupManager, FlightHistory, JobTracker, StatisticsEngine};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArchiveConfig>,
    pub cache: Arc<PersistentFlightCache>,
    pub archive: Arc<dyn HistoricalRepository>,
    pub statistics: Arc<StatisticsEngine>,
    pub backups: Arc<BackupManager>,
    /// Tracker shared with the background scheduler
    pub jobs: JobTracker,
}

impl AppState {
    /// Wire the statistics engine and backup manager over the given stores.
    pub fn new(
        config: ArchiveConfig,
        cache: Arc<PersistentFlightCache>,
        archive: Arc<dyn HistoricalRepository>,
        clock: SharedClock,
        jobs: JobTracker,
    ) -> Self {
        let history = FlightHistory::new(archive.clone(), cache.clone());
        let statistics = Arc::new(StatisticsEngine::new(history, clock.clone()));
        let backups = Arc::new(BackupManager::from_config(
            &config,
            cache.clone(),
            archive.clone(),
            clock,
        ));
        Self {
            config: Arc::new(config),
            cache,
            archive,
            statistics,
            backups,
            jobs,
        }
    }
}

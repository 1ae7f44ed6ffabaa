//! File-backed archive of daily snapshots.
//!
//! All snapshots live in one JSON object keyed `AIRPORT|YYYY-MM-DD|type`,
//! persisted through [`JsonFileStore`] after every change.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::db::models::ArchiveStatistics;
use crate::db::record_store::{JsonFileStore, LoadStatus};
use crate::db::repository::{HistoricalRepository, RepositoryResult};
use crate::models::{snapshot_key, DailySnapshot, FlightType};

pub struct JsonArchiveRepository {
    store: RwLock<JsonFileStore<DailySnapshot>>,
}

impl JsonArchiveRepository {
    /// Open the archive stored at `path`.
    pub fn open(path: impl Into<PathBuf>) -> RepositoryResult<(Self, LoadStatus)> {
        let (store, status) = JsonFileStore::open(path)?;
        info!(
            "Historical archive opened at {} ({} snapshots)",
            store.path().display(),
            store.len()
        );
        Ok((
            Self {
                store: RwLock::new(store),
            },
            status,
        ))
    }

    pub fn path(&self) -> PathBuf {
        self.store.read().path().to_path_buf()
    }

    /// Re-read the backing file.
    pub fn reload(&self) -> RepositoryResult<LoadStatus> {
        self.store.write().reload()
    }
}

#[async_trait]
impl HistoricalRepository for JsonArchiveRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let store = self.store.read();
        let dir_ok = match store.path().parent() {
            Some(p) if !p.as_os_str().is_empty() => !p.exists() || p.is_dir(),
            _ => true,
        };
        Ok(dir_ok)
    }

    async fn has_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<bool> {
        Ok(self
            .store
            .read()
            .contains_key(&snapshot_key(airport_code, date, flight_type)))
    }

    async fn save_daily_snapshot(&self, snapshot: DailySnapshot) -> RepositoryResult<()> {
        let key = snapshot.storage_key();
        let count = snapshot.flights.len();
        let mut store = self.store.write();
        store.insert(key.clone(), snapshot);
        store.save()?;
        debug!("Archived snapshot {} ({} flights)", key, count);
        Ok(())
    }

    async fn get_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<Option<DailySnapshot>> {
        Ok(self
            .store
            .read()
            .get(&snapshot_key(airport_code, date, flight_type))
            .cloned())
    }

    async fn get_data_for_range(
        &self,
        airport_code: &str,
        from: NaiveDate,
        to: NaiveDate,
        flight_type: Option<FlightType>,
    ) -> RepositoryResult<Vec<DailySnapshot>> {
        let airport = airport_code.to_uppercase();
        let mut snapshots: Vec<DailySnapshot> = self
            .store
            .read()
            .values()
            .filter(|s| {
                s.airport_code == airport
                    && s.date >= from
                    && s.date <= to
                    && flight_type.map_or(true, |t| s.flight_type == t)
            })
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| (s.date, s.flight_type));
        Ok(snapshots)
    }

    async fn get_available_dates(&self, airport_code: &str) -> RepositoryResult<Vec<NaiveDate>> {
        let airport = airport_code.to_uppercase();
        let dates: BTreeSet<NaiveDate> = self
            .store
            .read()
            .values()
            .filter(|s| s.airport_code == airport)
            .map(|s| s.date)
            .collect();
        Ok(dates.into_iter().rev().collect())
    }

    async fn get_cache_statistics(&self) -> RepositoryResult<ArchiveStatistics> {
        Ok(ArchiveStatistics::from_snapshots(self.store.read().values()))
    }

    async fn delete_before(&self, cutoff: NaiveDate) -> RepositoryResult<usize> {
        let mut store = self.store.write();
        let removed = store.remove_where(|_, s| s.date < cutoff);
        if removed > 0 {
            store.save()?;
            info!("Removed {} archived snapshots dated before {}", removed, cutoff);
        }
        Ok(removed)
    }

    async fn export_snapshot(&self, dest: &Path) -> RepositoryResult<usize> {
        let store = self.store.read();
        store.write_to(dest)?;
        Ok(store.values().map(|s| s.flights.len()).sum())
    }

    async fn restore_from(&self, src: &Path) -> RepositoryResult<usize> {
        let mut store = self.store.write();
        store
            .replace_from(src)
            .map_err(|e| e.with_operation("restore_from"))?;
        let records = store.values().map(|s| s.flights.len()).sum();
        info!("Historical archive restored from {} ({} records)", src.display(), records);
        Ok(records)
    }
}

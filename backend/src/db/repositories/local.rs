//! In-memory local repository implementation.
//!
//! Stores snapshots in a `BTreeMap` behind a lock, suitable for unit tests and
//! local development. Exports use the same JSON layout as the file-backed
//! archive, so a backup taken from one can be restored into the other.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use crate::db::models::ArchiveStatistics;
use crate::db::record_store::atomic_write;
use crate::db::repository::*;
use crate::models::{snapshot_key, DailySnapshot, FlightType};

/// In-memory local repository.
///
/// # Example
/// ```
/// use flight_archive::db::repositories::LocalRepository;
/// use flight_archive::db::repository::HistoricalRepository;
///
/// # tokio_test_block(async {
/// let repo = LocalRepository::new();
/// assert!(repo.get_available_dates("OTP").await.unwrap().is_empty());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Default)]
struct LocalData {
    snapshots: BTreeMap<String, DailySnapshot>,
    is_unhealthy: bool,
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.data.read().snapshots.len()
    }

    /// Make `health_check` and `export_snapshot` fail (for tests).
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_unhealthy = !healthy;
    }
}

#[async_trait]
impl HistoricalRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(!self.data.read().is_unhealthy)
    }

    async fn has_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<bool> {
        let key = snapshot_key(airport_code, date, flight_type);
        Ok(self.data.read().snapshots.contains_key(&key))
    }

    async fn save_daily_snapshot(&self, snapshot: DailySnapshot) -> RepositoryResult<()> {
        let key = snapshot.storage_key();
        self.data.write().snapshots.insert(key, snapshot);
        Ok(())
    }

    async fn get_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<Option<DailySnapshot>> {
        let key = snapshot_key(airport_code, date, flight_type);
        Ok(self.data.read().snapshots.get(&key).cloned())
    }

    async fn get_data_for_range(
        &self,
        airport_code: &str,
        from: NaiveDate,
        to: NaiveDate,
        flight_type: Option<FlightType>,
    ) -> RepositoryResult<Vec<DailySnapshot>> {
        let airport = airport_code.to_uppercase();
        let data = self.data.read();
        let mut snapshots: Vec<DailySnapshot> = data
            .snapshots
            .values()
            .filter(|s| s.airport_code == airport && s.date >= from && s.date <= to)
            .filter(|s| flight_type.map_or(true, |t| s.flight_type == t))
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| (s.date, s.flight_type));
        Ok(snapshots)
    }

    async fn get_available_dates(&self, airport_code: &str) -> RepositoryResult<Vec<NaiveDate>> {
        let airport = airport_code.to_uppercase();
        let dates: BTreeSet<NaiveDate> = self
            .data
            .read()
            .snapshots
            .values()
            .filter(|s| s.airport_code == airport)
            .map(|s| s.date)
            .collect();
        Ok(dates.into_iter().rev().collect())
    }

    async fn get_cache_statistics(&self) -> RepositoryResult<ArchiveStatistics> {
        Ok(ArchiveStatistics::from_snapshots(
            self.data.read().snapshots.values(),
        ))
    }

    async fn delete_before(&self, cutoff: NaiveDate) -> RepositoryResult<usize> {
        let mut data = self.data.write();
        let before = data.snapshots.len();
        data.snapshots.retain(|_, s| s.date >= cutoff);
        Ok(before - data.snapshots.len())
    }

    async fn export_snapshot(&self, dest: &Path) -> RepositoryResult<usize> {
        let data = self.data.read();
        if data.is_unhealthy {
            return Err(RepositoryError::internal("local repository marked unhealthy"));
        }
        let bytes = serde_json::to_vec_pretty(&data.snapshots)?;
        atomic_write(dest, &bytes)?;
        Ok(data.snapshots.values().map(|s| s.flights.len()).sum())
    }

    async fn restore_from(&self, src: &Path) -> RepositoryResult<usize> {
        let bytes = std::fs::read(src)?;
        let snapshots: BTreeMap<String, DailySnapshot> = serde_json::from_slice(&bytes)?;
        let records = snapshots.values().map(|s| s.flights.len()).sum();
        self.data.write().snapshots = snapshots;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn snapshot(airport: &str, d: u32, t: FlightType) -> DailySnapshot {
        DailySnapshot::new(
            airport,
            date(d),
            t,
            Utc.with_ymd_and_hms(2025, 3, d, 23, 0, 0).unwrap(),
            "test",
            vec![],
        )
    }

    #[tokio::test]
    async fn test_save_is_idempotent_per_triple() {
        let repo = LocalRepository::new();
        repo.save_daily_snapshot(snapshot("OTP", 1, FlightType::Arrival))
            .await
            .unwrap();
        let mut later = snapshot("OTP", 1, FlightType::Arrival);
        later.source = "second".into();
        repo.save_daily_snapshot(later).await.unwrap();

        assert_eq!(repo.snapshot_count(), 1);
        let stored = repo
            .get_data_for_date("otp", date(1), FlightType::Arrival)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.source, "second");
    }

    #[tokio::test]
    async fn test_range_skips_missing_days() {
        let repo = LocalRepository::new();
        for d in [1, 3, 5] {
            repo.save_daily_snapshot(snapshot("OTP", d, FlightType::Departure))
                .await
                .unwrap();
        }
        repo.save_daily_snapshot(snapshot("CLJ", 2, FlightType::Departure))
            .await
            .unwrap();

        let range = repo
            .get_data_for_range("OTP", date(1), date(4), None)
            .await
            .unwrap();
        let days: Vec<_> = range.iter().map(|s| s.date).collect();
        assert_eq!(days, vec![date(1), date(3)]);

        let dates = repo.get_available_dates("OTP").await.unwrap();
        assert_eq!(dates, vec![date(5), date(3), date(1)]);
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
    }
}

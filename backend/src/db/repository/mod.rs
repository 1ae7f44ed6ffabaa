//! Historical data store abstraction.
//!
//! The archive holds one [`DailySnapshot`] per `(airport, date, type)` triple.
//! It never substitutes data from the live flight cache: callers that want a
//! fallback compose the two themselves (see `services::history`).

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;

use crate::db::models::ArchiveStatistics;
use crate::models::{DailySnapshot, FlightType};

/// Storage backend for archival daily snapshots.
///
/// Implementations must be thread-safe (`Send + Sync`) so they can be shared
/// between the HTTP handlers, the scheduler and the backup manager.
#[async_trait]
pub trait HistoricalRepository: Send + Sync {
    /// Check that the store is usable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Whether a snapshot exists for the triple.
    async fn has_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<bool>;

    /// Store a snapshot, replacing any earlier one for the same triple.
    ///
    /// # Arguments
    /// * `snapshot` - The snapshot to store; its key is derived from
    ///   `(airport_code, date, flight_type)`
    async fn save_daily_snapshot(&self, snapshot: DailySnapshot) -> RepositoryResult<()>;

    /// Fetch the snapshot for the triple.
    ///
    /// # Returns
    /// * `Ok(Some(snapshot))` if archived
    /// * `Ok(None)` if no snapshot exists for that day
    async fn get_data_for_date(
        &self,
        airport_code: &str,
        date: NaiveDate,
        flight_type: FlightType,
    ) -> RepositoryResult<Option<DailySnapshot>>;

    /// Every snapshot of `airport_code` dated within `[from, to]`, ordered by
    /// date then type. Days without a snapshot are simply absent.
    ///
    /// # Arguments
    /// * `flight_type` - Restrict to one direction, or `None` for both
    async fn get_data_for_range(
        &self,
        airport_code: &str,
        from: NaiveDate,
        to: NaiveDate,
        flight_type: Option<FlightType>,
    ) -> RepositoryResult<Vec<DailySnapshot>>;

    /// Dates with at least one snapshot for the airport, newest first.
    async fn get_available_dates(&self, airport_code: &str) -> RepositoryResult<Vec<NaiveDate>>;

    /// Summary of everything archived.
    async fn get_cache_statistics(&self) -> RepositoryResult<ArchiveStatistics>;

    /// Remove snapshots dated before `cutoff`. Returns how many were removed.
    async fn delete_before(&self, cutoff: NaiveDate) -> RepositoryResult<usize>;

    /// Write the complete archive to `dest`, returning the number of records.
    async fn export_snapshot(&self, dest: &Path) -> RepositoryResult<usize>;

    /// Replace the archive with the content of a file written by `export_snapshot`.
    async fn restore_from(&self, src: &Path) -> RepositoryResult<usize>;
}

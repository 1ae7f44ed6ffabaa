//! High-level storage service layer.
//!
//! Functions here work with any [`HistoricalRepository`] and hold the policies
//! that span both stores: ingestion with write-through archiving, and the
//! retention sweep.
//!
//! ```text
//! provider batch ──► RawFlight::normalize ──► PersistentFlightCache (merge)
//!                                                    │
//!                               for each touched (airport, type, day)
//!                                                    ▼
//!                                      HistoricalRepository::save_daily_snapshot
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use flight_archive::db::{services, ArchiveConfig, StoreFactory, StoreType};
//! use flight_archive::models::{FlightType, RawFlight, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArchiveConfig::default();
//!     let cache = StoreFactory::open_cache(&config, Arc::new(SystemClock))?;
//!     let archive = StoreFactory::create_archive(StoreType::Json, &config)?;
//!
//!     let batch: Vec<RawFlight> = serde_json::from_str("[]")?;
//!     let report = services::ingest_flights(
//!         &cache, archive.as_ref(), "OTP", FlightType::Arrival, &batch, "provider",
//!     ).await?;
//!     println!("{} inserted", report.inserted);
//!     Ok(())
//! }
//! ```

use chrono::{Duration, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::flight_cache::PersistentFlightCache;
use super::repository::{HistoricalRepository, RepositoryResult};
use crate::models::{DailySnapshot, FlightType, RawFlight};

// ==================== Health ====================

/// Check if the historical repository is usable.
pub async fn health_check<R: HistoricalRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Ingestion ====================

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Archive snapshots written through.
    pub snapshots_written: usize,
    /// Archive snapshots that could not be written.
    pub snapshots_failed: usize,
}

/// Merge a provider batch into the cache and archive every touched day.
///
/// The batch as a whole never fails because of malformed elements; those are
/// defaulted during normalization. After the merge, the cache's complete view
/// of each `(airport, type, day)` the batch touched is saved as that day's
/// snapshot, so the archive always holds the merged state, not just the last
/// batch.
///
/// # Arguments
/// * `cache` - The persistent flight cache
/// * `archive` - Historical repository receiving the write-through snapshots
/// * `airport_code` - Airport the batch belongs to
/// * `flight_type` - Arrivals or departures
/// * `raw` - Provider elements
/// * `source` - Label stored on every record
///
/// # Returns
/// * `Ok(IngestReport)` - Counts; archive failures are counted, not raised
/// * `Err` if the cache could not be persisted
pub async fn ingest_flights<R: HistoricalRepository + ?Sized>(
    cache: &PersistentFlightCache,
    archive: &R,
    airport_code: &str,
    flight_type: FlightType,
    raw: &[RawFlight],
    source: &str,
) -> RepositoryResult<IngestReport> {
    let counts = cache.add_flight_data(airport_code, flight_type, raw, source)?;
    let mut report = IngestReport {
        inserted: counts.inserted,
        updated: counts.updated,
        unchanged: counts.unchanged,
        ..Default::default()
    };

    for date in &counts.dates {
        match archive_day(cache, archive, airport_code, flight_type, *date, source).await {
            Ok(()) => report.snapshots_written += 1,
            Err(e) => {
                warn!(
                    "Write-through archiving failed for {} {} {}: {}",
                    airport_code, flight_type, date, e
                );
                report.snapshots_failed += 1;
            }
        }
    }

    info!(
        "Ingested {} {} for {} from {}: {} inserted, {} updated, {} snapshots archived",
        raw.len(),
        flight_type,
        airport_code.to_uppercase(),
        source,
        report.inserted,
        report.updated,
        report.snapshots_written
    );
    Ok(report)
}

/// Save the cache's current view of one day as the archive snapshot.
pub async fn archive_day<R: HistoricalRepository + ?Sized>(
    cache: &PersistentFlightCache,
    archive: &R,
    airport_code: &str,
    flight_type: FlightType,
    date: NaiveDate,
    source: &str,
) -> RepositoryResult<()> {
    let flights = cache.get_flights_for_date(airport_code, flight_type, date);
    let snapshot = DailySnapshot::new(airport_code, date, flight_type, cache.now(), source, flights);
    archive.save_daily_snapshot(snapshot).await
}

// ==================== Retention ====================

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub cache_records_removed: usize,
    pub archive_snapshots_removed: usize,
}

/// Apply cache retention and, when configured, archive retention.
///
/// # Arguments
/// * `archive_retention_days` - Keep archive snapshots this many days; `None` keeps all
pub async fn sweep_retention<R: HistoricalRepository + ?Sized>(
    cache: &PersistentFlightCache,
    archive: &R,
    archive_retention_days: Option<i64>,
) -> RepositoryResult<RetentionReport> {
    let mut report = RetentionReport {
        cache_records_removed: cache.clean_old_data()?,
        ..Default::default()
    };

    if let Some(days) = archive_retention_days {
        let cutoff = cache.now().date_naive() - Duration::days(days);
        report.archive_snapshots_removed = archive.delete_before(cutoff).await?;
    }
    Ok(report)
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;

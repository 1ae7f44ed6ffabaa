//! Storage-level summaries returned by the cache and the archive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::DailySnapshot;

/// Result of merging one batch into the flight cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounts {
    pub inserted: usize,
    pub updated: usize,
    /// Incoming records that were not newer than the stored version.
    pub unchanged: usize,
    /// Scheduled days touched by the batch.
    pub dates: BTreeSet<NaiveDate>,
}

impl IngestCounts {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

/// Summary of the flight cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_flights: usize,
    pub flights_by_airport: BTreeMap<String, usize>,
    pub flights_by_type: BTreeMap<String, usize>,
    pub oldest_flight: Option<DateTime<Utc>>,
    pub newest_flight: Option<DateTime<Utc>>,
    pub cache_size_bytes: u64,
    /// Human readable size, e.g. `"12 KB"`.
    pub cache_size: String,
}

/// Calendar span covered by the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub total_days: usize,
}

/// How complete the archived records are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub records_with_delay_data: usize,
    pub records_with_actual_times: usize,
    pub completeness_percentage: u32,
}

/// Summary of the historical archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    pub total_records: usize,
    pub total_snapshots: usize,
    pub oldest_record: Option<NaiveDate>,
    pub newest_record: Option<NaiveDate>,
    pub airport_coverage: Vec<String>,
    pub date_range: DateRange,
    pub data_quality: DataQuality,
}

impl ArchiveStatistics {
    /// Summarize a set of snapshots.
    pub fn from_snapshots<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a DailySnapshot>,
    {
        let mut stats = ArchiveStatistics::default();
        let mut airports = BTreeSet::new();
        let mut dates = BTreeSet::new();

        for snapshot in snapshots {
            stats.total_snapshots += 1;
            stats.total_records += snapshot.flights.len();
            airports.insert(snapshot.airport_code.clone());
            dates.insert(snapshot.date);
            for flight in &snapshot.flights {
                if flight.delay_minutes > 0 {
                    stats.data_quality.records_with_delay_data += 1;
                }
                if flight.actual_time.is_some() {
                    stats.data_quality.records_with_actual_times += 1;
                }
            }
        }

        stats.oldest_record = dates.first().copied();
        stats.newest_record = dates.last().copied();
        stats.airport_coverage = airports.into_iter().collect();
        stats.date_range = DateRange {
            start: stats.oldest_record,
            end: stats.newest_record,
            total_days: dates.len(),
        };
        if stats.total_records > 0 {
            stats.data_quality.completeness_percentage = ((stats
                .data_quality
                .records_with_actual_times as f64
                / stats.total_records as f64)
                * 100.0)
                .round() as u32;
        }
        stats
    }
}

/// Render a byte count the way the admin surface shows it.
pub fn format_kb(bytes: u64) -> String {
    format!("{} KB", (bytes as f64 / 1024.0).round() as u64)
}

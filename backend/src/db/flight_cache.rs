//! Persistent flight cache.
//!
//! Merges provider observations by flight identity, keeps the most recently
//! observed version of each leg, and answers per-airport queries from memory.
//! The backing file is written once per batch, never per record.
//!
//! Retention is not applied on reads. [`PersistentFlightCache::clean_old_data`]
//! has to be called by a scheduled sweep.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::models::{format_kb, CacheStats, IngestCounts};
use super::record_store::{JsonFileStore, LoadStatus, MergeOutcome};
use super::repository::RepositoryResult;
use crate::models::{normalize_batch, FlightRecord, FlightType, RawFlight, SharedClock};

/// Default number of days a cached record is kept after its scheduled time.
pub const DEFAULT_RETENTION_DAYS: i64 = 14;

pub struct PersistentFlightCache {
    store: RwLock<JsonFileStore<FlightRecord>>,
    retention: Duration,
    clock: SharedClock,
}

impl PersistentFlightCache {
    /// Open the cache backed by `path`.
    ///
    /// A missing or unparsable file yields an empty cache; the returned
    /// [`LoadStatus`] tells the two apart from a successful load.
    pub fn open(
        path: impl Into<PathBuf>,
        retention_days: i64,
        clock: SharedClock,
    ) -> RepositoryResult<(Self, LoadStatus)> {
        let (store, status) = JsonFileStore::open(path)?;
        info!(
            "Flight cache opened at {} ({} records)",
            store.path().display(),
            store.len()
        );
        Ok((
            Self {
                store: RwLock::new(store),
                retention: Duration::days(retention_days.max(0)),
                clock,
            },
            status,
        ))
    }

    pub fn path(&self) -> PathBuf {
        self.store.read().path().to_path_buf()
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Normalize a provider batch and merge it.
    pub fn add_flight_data(
        &self,
        airport_code: &str,
        flight_type: FlightType,
        raw: &[RawFlight],
        source: &str,
    ) -> RepositoryResult<IngestCounts> {
        let records = normalize_batch(raw, airport_code, flight_type, source, self.clock.now());
        self.merge_records(records)
    }

    /// Merge already-normalized records.
    ///
    /// A stored record is replaced only when the incoming `cached_at` is
    /// strictly newer. The store is persisted once, after the whole batch;
    /// if that save fails the batch is undone in memory and the error returned.
    pub fn merge_records(&self, records: Vec<FlightRecord>) -> RepositoryResult<IngestCounts> {
        let mut counts = IngestCounts::default();
        let mut store = self.store.write();
        // Previous value per changed key, to undo the batch if it cannot be saved.
        let mut undo: Vec<(String, Option<FlightRecord>)> = Vec::new();

        for record in records {
            counts.dates.insert(record.scheduled_date());
            let key = record.key().to_string();
            let previous = store.get(&key).cloned();
            match store.merge(key.clone(), record, |stored, incoming| {
                incoming.cached_at > stored.cached_at
            }) {
                MergeOutcome::Inserted => {
                    counts.inserted += 1;
                    undo.push((key, None));
                }
                MergeOutcome::Replaced => {
                    counts.updated += 1;
                    undo.push((key, previous));
                }
                MergeOutcome::Kept => counts.unchanged += 1,
            }
        }

        if counts.changed() {
            if let Err(e) = store.save() {
                warn!("Flight cache save failed, batch of {} changes rolled back: {}", undo.len(), e);
                for (key, previous) in undo.into_iter().rev() {
                    match previous {
                        Some(record) => {
                            store.insert(key, record);
                        }
                        None => {
                            store.remove(&key);
                        }
                    }
                }
                return Err(e);
            }
        }
        info!(
            "Merged batch into flight cache: {} inserted, {} updated, {} unchanged",
            counts.inserted, counts.updated, counts.unchanged
        );
        Ok(counts)
    }

    /// All records of one airport and direction, newest scheduled time first.
    pub fn get_flight_data(&self, airport_code: &str, flight_type: FlightType) -> Vec<FlightRecord> {
        let airport = airport_code.to_uppercase();
        self.collect_sorted(|r| r.airport_code == airport && r.flight_type == flight_type)
    }

    /// All records of one airport, newest scheduled time first.
    pub fn get_all_flight_data(&self, airport_code: &str) -> Vec<FlightRecord> {
        let airport = airport_code.to_uppercase();
        self.collect_sorted(|r| r.airport_code == airport)
    }

    /// Records of one airport and direction scheduled on `date` (UTC).
    pub fn get_flights_for_date(
        &self,
        airport_code: &str,
        flight_type: FlightType,
        date: NaiveDate,
    ) -> Vec<FlightRecord> {
        let airport = airport_code.to_uppercase();
        self.collect_sorted(|r| {
            r.airport_code == airport && r.flight_type == flight_type && r.scheduled_date() == date
        })
    }

    fn collect_sorted<F>(&self, mut predicate: F) -> Vec<FlightRecord>
    where
        F: FnMut(&FlightRecord) -> bool,
    {
        let mut records: Vec<FlightRecord> = self
            .store
            .read()
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        records
    }

    /// Delete every record scheduled before `now - retention`.
    ///
    /// # Returns
    /// Number of records removed. The file is only rewritten when something
    /// was removed.
    pub fn clean_old_data(&self) -> RepositoryResult<usize> {
        let cutoff = self.clock.now() - self.retention;
        let mut store = self.store.write();
        let removed = store.remove_where(|_, r| r.scheduled_time < cutoff);
        if removed > 0 {
            store.save()?;
            info!("Retention sweep removed {} cached records older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let store = self.store.read();
        let mut stats = CacheStats {
            total_flights: store.len(),
            ..Default::default()
        };
        let mut by_airport: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();

        for record in store.values() {
            *by_airport.entry(record.airport_code.clone()).or_default() += 1;
            *by_type.entry(record.flight_type.to_string()).or_default() += 1;
            stats.oldest_flight = Some(match stats.oldest_flight {
                Some(t) if t <= record.scheduled_time => t,
                _ => record.scheduled_time,
            });
            stats.newest_flight = Some(match stats.newest_flight {
                Some(t) if t >= record.scheduled_time => t,
                _ => record.scheduled_time,
            });
        }

        stats.flights_by_airport = by_airport;
        stats.flights_by_type = by_type;
        stats.cache_size_bytes = store.file_size();
        stats.cache_size = format_kb(stats.cache_size_bytes);
        stats
    }

    /// Remove every record and persist immediately.
    pub fn clear_all_cache(&self) -> RepositoryResult<usize> {
        let mut store = self.store.write();
        let removed = store.clear();
        store.save()?;
        warn!("Cleared flight cache ({} records)", removed);
        Ok(removed)
    }

    /// Remove every record of one airport and persist immediately.
    pub fn clear_airport_cache(&self, airport_code: &str) -> RepositoryResult<usize> {
        let airport = airport_code.to_uppercase();
        let mut store = self.store.write();
        let removed = store.remove_where(|_, r| r.airport_code == airport);
        store.save()?;
        warn!("Cleared {} cached records for {}", removed, airport);
        Ok(removed)
    }

    /// Write the current content to `dest`, returning the record count.
    pub fn snapshot_to(&self, dest: &Path) -> RepositoryResult<usize> {
        let store = self.store.read();
        store.write_to(dest)?;
        Ok(store.len())
    }

    /// Replace the cache with the content of `src`.
    pub fn restore_from(&self, src: &Path) -> RepositoryResult<usize> {
        let count = self
            .store
            .write()
            .replace_from(src)
            .map_err(|e| e.with_operation("restore_from"))?;
        info!("Flight cache restored from {} ({} records)", src.display(), count);
        Ok(count)
    }

    /// Re-read the backing file.
    pub fn reload(&self) -> RepositoryResult<LoadStatus> {
        self.store.write().reload()
    }

    /// Persist the in-memory content.
    pub fn flush(&self) -> RepositoryResult<()> {
        self.store.read().save()
    }

    pub fn file_size(&self) -> u64 {
        self.store.read().file_size()
    }
}

#[cfg(test)]
#[path = "flight_cache_tests.rs"]
mod tests;

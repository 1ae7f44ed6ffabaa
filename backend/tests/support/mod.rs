#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use flight_archive::db::{ArchiveConfig, JsonArchiveRepository, PersistentFlightCache};
use flight_archive::models::{FixedClock, RawFlight};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =========================================================
// Store fixtures
// =========================================================

/// 2025-03-10T18:00:00Z, the "now" used across integration tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap()
}

/// File-backed stores in a temporary data directory.
pub struct Stores {
    pub dir: TempDir,
    pub config: ArchiveConfig,
    pub clock: Arc<FixedClock>,
    pub cache: Arc<PersistentFlightCache>,
    pub archive: Arc<JsonArchiveRepository>,
}

impl Stores {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ArchiveConfig::with_data_dir(dir.path());
        let clock = Arc::new(FixedClock::new(fixed_now()));
        let (cache, _) =
            PersistentFlightCache::open(config.cache_path(), config.retention_days, clock.clone())
                .unwrap();
        let (archive, _) = JsonArchiveRepository::open(config.archive_path()).unwrap();
        Self {
            dir,
            config,
            clock,
            cache: Arc::new(cache),
            archive: Arc::new(archive),
        }
    }

    /// Reopen both stores from disk, as a restarted process would.
    pub fn reopen(&self) -> (PersistentFlightCache, JsonArchiveRepository) {
        let (cache, _) = PersistentFlightCache::open(
            self.config.cache_path(),
            self.config.retention_days,
            self.clock.clone(),
        )
        .unwrap();
        let (archive, _) = JsonArchiveRepository::open(self.config.archive_path()).unwrap();
        (cache, archive)
    }
}

/// Provider element in the nested-object shape.
pub fn provider_flight(number: &str, airline: &str, scheduled: &str, status: &str, delay: u32) -> Value {
    json!({
        "flight_number": number,
        "airline": {"code": airline, "name": format!("{} Airlines", airline)},
        "origin": {"code": "LHR", "name": "London Heathrow"},
        "destination": {"code": "OTP", "name": "Bucharest Otopeni"},
        "scheduled_time": scheduled,
        "status": status,
        "delay": delay
    })
}

pub fn raw(values: Vec<Value>) -> Vec<RawFlight> {
    values.into_iter().map(RawFlight::from).collect()
}

/// A day of arrivals at OTP on 2025-03-10: six landed on time, two delayed,
/// one cancelled, one still scheduled.
pub fn otp_arrivals() -> Vec<RawFlight> {
    raw(vec![
        provider_flight("RO302", "RO", "2025-03-10T06:10:00Z", "landed", 0),
        provider_flight("RO304", "RO", "2025-03-10T07:20:00Z", "landed", 5),
        provider_flight("W63102", "W6", "2025-03-10T07:40:00Z", "landed", 0),
        provider_flight("W63104", "W6", "2025-03-10T08:05:00Z", "delayed", 40),
        provider_flight("FR201", "FR", "2025-03-10T08:30:00Z", "landed", 0),
        provider_flight("FR203", "FR", "2025-03-10T09:15:00Z", "delayed", 80),
        provider_flight("LH1650", "LH", "2025-03-10T11:00:00Z", "landed", 0),
        provider_flight("LH1652", "LH", "2025-03-10T13:45:00Z", "landed", 10),
        provider_flight("OS781", "OS", "2025-03-10T15:00:00Z", "cancelled", 0),
        provider_flight("OS783", "OS", "2025-03-10T19:30:00Z", "scheduled", 0),
    ])
}

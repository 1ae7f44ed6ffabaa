use super::*;
use crate::db::repositories::LocalRepository;
use crate::models::FixedClock;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, Arc<FixedClock>, PersistentFlightCache, LocalRepository) {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, 20, 0, 0).unwrap(),
    ));
    let (cache, _) =
        PersistentFlightCache::open(dir.path().join("cache.json"), 14, clock.clone()).unwrap();
    (dir, clock, cache, LocalRepository::new())
}

fn flight(number: &str, when: &str) -> RawFlight {
    RawFlight::from(json!({
        "flight_number": number,
        "scheduled_time": when,
        "status": "landed"
    }))
}

#[tokio::test]
async fn test_ingest_writes_through_each_day() {
    let (_dir, _clock, cache, archive) = setup();
    let batch = vec![
        flight("A1", "2025-03-09T22:00:00Z"),
        flight("A2", "2025-03-10T08:00:00Z"),
        flight("A3", "2025-03-10T09:00:00Z"),
    ];

    let report = ingest_flights(&cache, &archive, "OTP", FlightType::Arrival, &batch, "test")
        .await
        .unwrap();
    assert_eq!(report.inserted, 3);
    assert_eq!(report.snapshots_written, 2);

    let day = archive
        .get_data_for_date("OTP", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), FlightType::Arrival)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(day.flights.len(), 2);
}

#[tokio::test]
async fn test_snapshot_holds_merged_day_not_last_batch() {
    let (_dir, clock, cache, archive) = setup();
    ingest_flights(
        &cache,
        &archive,
        "OTP",
        FlightType::Arrival,
        &[flight("A1", "2025-03-10T08:00:00Z")],
        "test",
    )
    .await
    .unwrap();

    clock.advance(Duration::minutes(15));
    ingest_flights(
        &cache,
        &archive,
        "OTP",
        FlightType::Arrival,
        &[flight("A2", "2025-03-10T09:00:00Z")],
        "test",
    )
    .await
    .unwrap();

    let day = archive
        .get_data_for_date("OTP", NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), FlightType::Arrival)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(day.flights.len(), 2);
}

#[tokio::test]
async fn test_sweep_retention_cache_and_archive() {
    let (_dir, clock, cache, archive) = setup();
    ingest_flights(
        &cache,
        &archive,
        "OTP",
        FlightType::Departure,
        &[flight("D1", "2025-03-01T10:00:00Z"), flight("D2", "2025-03-10T10:00:00Z")],
        "test",
    )
    .await
    .unwrap();

    clock.advance(Duration::days(6));
    let report = sweep_retention(&cache, &archive, Some(10)).await.unwrap();
    assert_eq!(report.cache_records_removed, 1);
    assert_eq!(report.archive_snapshots_removed, 1);
    assert_eq!(cache.len(), 1);

    let report = sweep_retention(&cache, &archive, None).await.unwrap();
    assert_eq!(report, RetentionReport::default());
}

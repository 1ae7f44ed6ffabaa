//! End-to-end ingestion over the file-backed stores.

mod support;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

use flight_archive::db::repository::HistoricalRepository;
use flight_archive::db::services;
use flight_archive::models::{FlightStatus, FlightType};
use flight_archive::services::{FlightHistory, StatisticsEngine};
use support::{otp_arrivals, provider_flight, raw, Stores};

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

#[tokio::test]
async fn test_ingest_persists_cache_and_archive() {
    let stores = Stores::new();
    let report = services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "otp",
        FlightType::Arrival,
        &otp_arrivals(),
        "aerodatabox",
    )
    .await
    .unwrap();

    assert_eq!(report.inserted, 10);
    assert_eq!(report.snapshots_written, 1);
    assert_eq!(report.snapshots_failed, 0);

    let (cache, archive) = stores.reopen();
    assert_eq!(cache.len(), 10);
    let snapshot = archive
        .get_data_for_date("OTP", march(10), FlightType::Arrival)
        .await
        .unwrap()
        .expect("snapshot written through");
    assert_eq!(snapshot.flights.len(), 10);
    assert!(snapshot.flights.iter().all(|f| f.airport_code == "OTP"));
    assert_eq!(archive.get_available_dates("OTP").await.unwrap(), vec![march(10)]);
}

#[tokio::test]
async fn test_snapshot_holds_merged_view_of_the_day() {
    let stores = Stores::new();
    let morning = raw(vec![
        provider_flight("RO302", "RO", "2025-03-10T06:10:00Z", "scheduled", 0),
        provider_flight("RO304", "RO", "2025-03-10T07:20:00Z", "scheduled", 0),
    ]);
    services::ingest_flights(&stores.cache, stores.archive.as_ref(), "OTP", FlightType::Arrival, &morning, "api")
        .await
        .unwrap();

    stores.clock.advance(Duration::minutes(30));
    let update = raw(vec![
        provider_flight("RO304", "RO", "2025-03-10T07:20:00Z", "delayed", 25),
        provider_flight("W63102", "W6", "2025-03-10T07:40:00Z", "landed", 0),
    ]);
    let report = services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Arrival,
        &update,
        "api",
    )
    .await
    .unwrap();
    assert_eq!((report.inserted, report.updated), (1, 1));

    let snapshot = stores
        .archive
        .get_data_for_date("OTP", march(10), FlightType::Arrival)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.flights.len(), 3);
    let ro304 = snapshot
        .flights
        .iter()
        .find(|f| f.flight_number == "RO304")
        .unwrap();
    assert_eq!(ro304.status, FlightStatus::Delayed);
    assert_eq!(ro304.delay_minutes, 25);
}

#[tokio::test]
async fn test_malformed_elements_are_defaulted_not_rejected() {
    let stores = Stores::new();
    let batch = raw(vec![
        json!({"flightNumber": "FR201", "scheduledTime": "2025-03-10 08:30", "delayMinutes": "12"}),
        json!("not an object"),
        json!({"number": "W63131", "airline": "Wizz Air", "scheduled_time": 1741600800}),
    ]);
    let report = services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Departure,
        &batch,
        "api",
    )
    .await
    .unwrap();
    assert_eq!(report.inserted + report.updated + report.unchanged, 3);

    let flights = stores.cache.get_flight_data("OTP", FlightType::Departure);
    let fr201 = flights.iter().find(|f| f.flight_number == "FR201").unwrap();
    assert_eq!(fr201.delay_minutes, 12);
    assert_eq!(
        fr201.scheduled_time,
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap()
    );
    assert!(flights.iter().any(|f| f.airline_name == "Wizz Air"));
}

#[tokio::test]
async fn test_retention_sweep_keeps_archive_by_default() {
    let stores = Stores::new();
    services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Arrival,
        &otp_arrivals(),
        "api",
    )
    .await
    .unwrap();

    stores
        .clock
        .set(Utc.with_ymd_and_hms(2025, 3, 25, 0, 0, 0).unwrap());
    let report = services::sweep_retention(&stores.cache, stores.archive.as_ref(), None)
        .await
        .unwrap();
    assert_eq!(report.cache_records_removed, 10);
    assert_eq!(report.archive_snapshots_removed, 0);
    assert!(stores.cache.is_empty());

    // The archived day still feeds the statistics.
    let engine = StatisticsEngine::new(
        FlightHistory::new(stores.archive.clone(), stores.cache.clone()),
        stores.clock.clone(),
    );
    let stats = engine.get_daily_statistics("OTP", march(10)).await;
    assert_eq!(stats.total_flights, 10);
}

#[tokio::test]
async fn test_archive_retention_when_configured() {
    let stores = Stores::new();
    services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Arrival,
        &otp_arrivals(),
        "api",
    )
    .await
    .unwrap();

    stores
        .clock
        .set(Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap());
    let report = services::sweep_retention(&stores.cache, stores.archive.as_ref(), Some(30))
        .await
        .unwrap();
    assert_eq!(report.archive_snapshots_removed, 1);

    let archive: Arc<dyn HistoricalRepository> = stores.archive.clone();
    assert!(archive.get_available_dates("OTP").await.unwrap().is_empty());
}

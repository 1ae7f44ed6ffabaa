//! Statistics engine over ingested data, plus aggregate properties.

mod support;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;

use flight_archive::api::{AnalysisPeriod, ComparisonType};
use flight_archive::db::services;
use flight_archive::models::{FlightRecord, FlightStatus, FlightType};
use flight_archive::services::statistics::{build_range_statistics, compute_daily_statistics};
use flight_archive::services::{FlightHistory, StatisticsEngine};
use support::{otp_arrivals, provider_flight, raw, Stores};

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

async fn seeded_engine() -> (Stores, StatisticsEngine) {
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
    let engine = StatisticsEngine::new(
        FlightHistory::new(stores.archive.clone(), stores.cache.clone()),
        stores.clock.clone(),
    );
    (stores, engine)
}

#[tokio::test]
async fn test_daily_statistics_for_ingested_day() {
    let (_stores, engine) = seeded_engine().await;
    let stats = engine.get_daily_statistics("otp", march(10)).await;

    assert_eq!(stats.airport, "OTP");
    assert_eq!(stats.total_flights, 10);
    assert_eq!(stats.on_time_flights, 7);
    assert_eq!(stats.delayed_flights, 2);
    assert_eq!(stats.cancelled_flights, 1);
    assert_eq!(stats.on_time_percentage, 70);
    // Mean of the positive delays 5, 40, 80 and 10.
    assert_eq!(stats.average_delay, 34);
    assert_eq!(stats.delay_index, 26);
    assert_eq!(stats.peak_hours, vec![6, 7, 8, 9]);
    assert_eq!(stats.top_airlines.len(), 5);
    assert_eq!(stats.hourly_distribution.len(), 24);
}

#[tokio::test]
async fn test_departures_and_arrivals_are_combined() {
    let (stores, engine) = seeded_engine().await;
    let departures = raw(vec![
        provider_flight("RO301", "RO", "2025-03-10T05:30:00Z", "departed", 0),
        provider_flight("RO303", "RO", "2025-03-10T06:45:00Z", "departed", 20),
    ]);
    services::ingest_flights(
        &stores.cache,
        stores.archive.as_ref(),
        "OTP",
        FlightType::Departure,
        &departures,
        "api",
    )
    .await
    .unwrap();

    let stats = engine.get_daily_statistics("OTP", march(10)).await;
    assert_eq!(stats.total_flights, 12);
    assert_eq!(stats.delayed_flights, 3);
}

#[tokio::test]
async fn test_range_and_trend_windows() {
    let (_stores, engine) = seeded_engine().await;

    let range = engine.get_range_statistics("OTP", march(4), march(10)).await;
    assert_eq!(range.total_days, 7);
    assert_eq!(range.daily_stats.len(), 7);
    assert_eq!(range.aggregated.total_flights, 10);
    assert_eq!(range.aggregated.average_flights_per_day, 1);
    assert_eq!(range.aggregated.best_day.as_ref().unwrap().date, march(10));

    let trend = engine.get_trend_analysis("OTP", AnalysisPeriod::Week).await;
    assert_eq!(trend.data_points.len(), 7);
    assert_eq!(trend.data_points.last().unwrap().date, march(10));
    assert_eq!(trend.data_points.last().unwrap().total_flights, 10);
}

#[tokio::test]
async fn test_day_over_day_comparison() {
    let (_stores, engine) = seeded_engine().await;
    let comparison = engine
        .get_comparative_analysis("OTP", ComparisonType::DayOverDay)
        .await;
    assert_eq!(comparison.current_period.from, march(10));
    assert_eq!(comparison.previous_period.from, march(9));
    assert_eq!(comparison.current_period.total_flights, 10);
    assert_eq!(comparison.previous_period.total_flights, 0);
    assert_eq!(comparison.changes.traffic_change, 100.0);
}

#[tokio::test]
async fn test_unknown_airport_yields_zero_report() {
    let (_stores, engine) = seeded_engine().await;
    let stats = engine.get_daily_statistics("CLJ", march(10)).await;
    assert_eq!(stats.total_flights, 0);
    assert_eq!(stats.on_time_percentage, 0);
    assert_eq!(stats.delay_index, 0);
    assert!(stats.peak_hours.is_empty());
    assert!(stats.top_airlines.is_empty());
}

// =========================================================
// Properties
// =========================================================

const STATUSES: [FlightStatus; 6] = [
    FlightStatus::Scheduled,
    FlightStatus::Landed,
    FlightStatus::Delayed,
    FlightStatus::Cancelled,
    FlightStatus::Departed,
    FlightStatus::Diverted,
];

fn flight(index: usize, hour: u32, status: usize, delay: u32, airline: usize) -> FlightRecord {
    let scheduled = Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap();
    FlightRecord {
        flight_number: format!("XX{}", index),
        airline_code: format!("A{}", airline),
        airline_name: format!("Airline {}", airline),
        origin_code: "LHR".to_string(),
        origin_name: String::new(),
        destination_code: "OTP".to_string(),
        destination_name: String::new(),
        scheduled_time: scheduled,
        actual_time: None,
        estimated_time: None,
        status: STATUSES[status],
        delay_minutes: delay,
        airport_code: "OTP".to_string(),
        flight_type: FlightType::Arrival,
        cached_at: scheduled,
        source: "proptest".to_string(),
    }
}

fn flights_strategy() -> impl Strategy<Value = Vec<FlightRecord>> {
    prop::collection::vec((0u32..24, 0usize..STATUSES.len(), 0u32..600, 0usize..15), 0..60)
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (hour, status, delay, airline))| flight(i, hour, status, delay, airline))
                .collect()
        })
}

proptest! {
    #[test]
    fn prop_daily_counts_are_bounded(flights in flights_strategy()) {
        let stats = compute_daily_statistics("OTP", march(10), &flights);
        prop_assert_eq!(stats.total_flights, flights.len());
        prop_assert!(stats.on_time_flights + stats.cancelled_flights <= stats.total_flights);
        prop_assert!(stats.delayed_flights <= stats.total_flights);
        prop_assert!(stats.on_time_percentage <= 100);
        prop_assert!(stats.delay_index <= 100);
        prop_assert!(stats.peak_hours.len() <= 4);
        prop_assert!(stats.peak_hours.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(stats.top_airlines.len() <= 10);
        prop_assert_eq!(
            stats.hourly_distribution.iter().map(|h| h.flights).sum::<usize>(),
            flights.len()
        );
    }

    #[test]
    fn prop_range_has_one_entry_per_day(offset in 0i64..40, span in 0i64..40) {
        let from = march(1) + Duration::days(offset);
        let to = from + Duration::days(span);
        let by_day: BTreeMap<NaiveDate, Vec<FlightRecord>> = BTreeMap::new();
        let range = build_range_statistics("OTP", from, to, &by_day);
        prop_assert_eq!(range.daily_stats.len() as i64, span + 1);
        prop_assert_eq!(range.total_days as i64, span + 1);
        prop_assert_eq!(range.daily_stats.first().map(|d| d.date), Some(from));
        prop_assert_eq!(range.daily_stats.last().map(|d| d.date), Some(to));
    }
}

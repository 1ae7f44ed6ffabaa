use super::*;
use chrono::TimeZone;
use serde_json::json;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

#[test]
fn test_snake_case_nested_payload() {
    let raw = RawFlight::from(json!({
        "flight_number": "RO 301",
        "airline": {"code": "RO", "name": "TAROM"},
        "origin": {"code": "OTP", "name": "Bucharest"},
        "destination": {"code": "CDG", "name": "Paris"},
        "scheduled_time": "2025-03-10 07:45+02:00",
        "actual_time": "2025-03-10T06:02:00Z",
        "status": "Delayed",
        "delay": 17
    }));
    let r = raw.normalize("otp", FlightType::Departure, "aerodatabox", now());

    assert_eq!(r.flight_number, "RO 301");
    assert_eq!(r.airline_code, "RO");
    assert_eq!(r.airline_name, "TAROM");
    assert_eq!(r.origin_name, "Bucharest");
    assert_eq!(r.destination_code, "CDG");
    assert_eq!(r.scheduled_time, Utc.with_ymd_and_hms(2025, 3, 10, 5, 45, 0).unwrap());
    assert_eq!(r.actual_time, Some(Utc.with_ymd_and_hms(2025, 3, 10, 6, 2, 0).unwrap()));
    assert_eq!(r.status, FlightStatus::Delayed);
    assert_eq!(r.delay_minutes, 17);
    assert_eq!(r.airport_code, "OTP");
    assert_eq!(r.cached_at, now());
    assert_eq!(r.source, "aerodatabox");
}

#[test]
fn test_camel_case_flat_payload() {
    let raw = RawFlight::from(json!({
        "flightNumber": "W6 3101",
        "airlineCode": "W6",
        "airlineName": "Wizz Air",
        "originCode": "LTN",
        "scheduledTime": "2025-03-10T09:10:00",
        "delayMinutes": "22"
    }));
    let r = raw.normalize("OTP", FlightType::Arrival, "test", now());

    assert_eq!(r.flight_number, "W6 3101");
    assert_eq!(r.airline_code, "W6");
    assert_eq!(r.origin_code, "LTN");
    assert_eq!(r.scheduled_time, Utc.with_ymd_and_hms(2025, 3, 10, 9, 10, 0).unwrap());
    assert_eq!(r.status, FlightStatus::Scheduled);
    assert_eq!(r.delay_minutes, 22);
}

#[test]
fn test_missing_fields_get_placeholders() {
    let r = RawFlight::from(json!({})).normalize("OTP", FlightType::Arrival, "test", now());
    assert_eq!(r.flight_number, UNKNOWN_FLIGHT_NUMBER);
    assert_eq!(r.airline_code, UNKNOWN_AIRLINE_CODE);
    assert_eq!(r.airline_name, UNKNOWN_AIRLINE_NAME);
    assert_eq!(r.scheduled_time, now());
    assert_eq!(r.delay_minutes, 0);
    assert!(r.origin_code.is_empty());
}

#[test]
fn test_non_object_element_is_defaulted() {
    let batch: Vec<RawFlight> = serde_json::from_value(json!([42, "x", null])).unwrap();
    let records = normalize_batch(&batch, "OTP", FlightType::Arrival, "test", now());
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.flight_number == UNKNOWN_FLIGHT_NUMBER));
}

#[test]
fn test_negative_and_garbage_delays_become_zero() {
    let neg = RawFlight::from(json!({"delay": -5})).normalize("OTP", FlightType::Arrival, "t", now());
    assert_eq!(neg.delay_minutes, 0);
    let junk = RawFlight::from(json!({"delay": "soon"})).normalize("OTP", FlightType::Arrival, "t", now());
    assert_eq!(junk.delay_minutes, 0);
}

#[test]
fn test_airline_as_plain_string_is_a_name() {
    let r = RawFlight::from(json!({"airline": "Lufthansa"}))
        .normalize("OTP", FlightType::Arrival, "t", now());
    assert_eq!(r.airline_name, "Lufthansa");
    assert_eq!(r.airline_code, UNKNOWN_AIRLINE_CODE);
}

#[test]
fn test_parse_timestamp_variants() {
    let expected = Utc.with_ymd_and_hms(2025, 3, 10, 5, 45, 0).unwrap();
    assert_eq!(parse_timestamp("2025-03-10T07:45:00+02:00"), Some(expected));
    assert_eq!(parse_timestamp("2025-03-10 07:45+02:00"), Some(expected));
    assert_eq!(parse_timestamp("2025-03-10 05:45"), Some(expected));
    assert_eq!(parse_timestamp("yesterday"), None);
}

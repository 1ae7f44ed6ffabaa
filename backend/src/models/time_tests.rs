use super::*;
use chrono::{FixedOffset, TimeZone};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_days_inclusive_counts_both_ends() {
    let days: Vec<_> = days_inclusive(date(2025, 2, 27), date(2025, 3, 2)).collect();
    assert_eq!(
        days,
        vec![date(2025, 2, 27), date(2025, 2, 28), date(2025, 3, 1), date(2025, 3, 2)]
    );
    assert_eq!(days_in_range(date(2025, 2, 27), date(2025, 3, 2)), 4);
}

#[test]
fn test_days_inclusive_reversed_is_empty() {
    assert_eq!(days_inclusive(date(2025, 3, 2), date(2025, 3, 1)).count(), 0);
    assert_eq!(days_in_range(date(2025, 3, 2), date(2025, 3, 1)), 0);
}

#[test]
fn test_parse_date_is_strict() {
    assert_eq!(parse_date("2025-03-10"), Some(date(2025, 3, 10)));
    assert_eq!(parse_date("2025-3-10"), None);
    assert_eq!(parse_date("2025-02-30"), None);
    assert_eq!(parse_date("10/03/2025"), None);
}

#[test]
fn test_next_midnight_fixed_offset() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = tz.with_ymd_and_hms(2025, 3, 10, 23, 59, 30).unwrap();
    let next = next_midnight(&now);
    assert_eq!(next, tz.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap());
}

#[test]
fn test_until_next_local_midnight_within_a_day() {
    let wait = until_next_local_midnight(Utc::now());
    assert!(wait.as_secs() <= 25 * 3600);
}

#[test]
fn test_fixed_clock_advances() {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());
    clock.advance(Duration::days(2));
    assert_eq!(clock.today(), date(2025, 3, 12));
}

#[test]
fn test_same_day_previous_month_clamps() {
    assert_eq!(same_day_previous_month(date(2025, 3, 31)), date(2025, 2, 28));
    assert_eq!(same_day_previous_month(date(2025, 1, 15)), date(2024, 12, 15));
}

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of "now" for retention, windows and backup timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in UTC.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Every calendar day in `[from, to]`, in order. Empty when `from > to`.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d <= to)
}

/// Number of days in `[from, to]`, or zero when `from > to`.
pub fn days_in_range(from: NaiveDate, to: NaiveDate) -> usize {
    if from > to {
        0
    } else {
        ((to - from).num_days() + 1) as usize
    }
}

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// First instant of the next calendar day in `now`'s time zone.
///
/// When local midnight does not exist (a DST gap) the first valid instant
/// after it is used; when it is ambiguous the earlier one is used.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let tomorrow = now.date_naive() + Duration::days(1);
    let mut candidate = tomorrow.and_time(chrono::NaiveTime::MIN);
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt;
        }
        candidate += Duration::minutes(30);
    }
    now.clone() + Duration::days(1)
}

/// Time left until the next local midnight.
pub fn until_next_local_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let local = now.with_timezone(&Local);
    let target = next_midnight(&local);
    (target.with_timezone(&Utc) - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(1))
}

/// Date one calendar month before `date`, clamped to the last day of that month.
pub fn same_day_previous_month(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(chrono::Months::new(1))
        .unwrap_or(date - Duration::days(30))
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;

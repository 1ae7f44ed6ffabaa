//! Tolerant ingestion boundary.
//!
//! Provider payloads arrive with inconsistent field spellings (snake_case and
//! camelCase, nested `airline` objects or flat `airlineCode`, delays as numbers
//! or strings). [`RawFlight`] accepts any JSON value and [`RawFlight::normalize`]
//! maps it onto one [`FlightRecord`], substituting placeholder values instead of
//! rejecting the element.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::flight::{FlightRecord, FlightStatus, FlightType};

/// Placeholder flight number for elements without one.
pub const UNKNOWN_FLIGHT_NUMBER: &str = "UNKNOWN";
/// Placeholder airline code for elements without one.
pub const UNKNOWN_AIRLINE_CODE: &str = "XX";
/// Placeholder airline name for elements without one.
pub const UNKNOWN_AIRLINE_NAME: &str = "Unknown";

/// One loosely-typed flight observation as received from the provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Value")]
pub struct RawFlight {
    fields: Map<String, Value>,
}

impl From<Value> for RawFlight {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            other => {
                warn!("Ingestion element is not an object ({}), using defaults", type_name(&other));
                Self::default()
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl RawFlight {
    /// Map this observation onto the canonical record.
    ///
    /// `airport_code` is upper-cased; `now` becomes `cached_at` and stands in
    /// for a missing or unparsable scheduled time.
    pub fn normalize(
        &self,
        airport_code: &str,
        flight_type: FlightType,
        source: &str,
        now: DateTime<Utc>,
    ) -> FlightRecord {
        let flight_number = self
            .text(&["flight_number", "flightNumber", "number"])
            .unwrap_or_else(|| UNKNOWN_FLIGHT_NUMBER.to_string());

        let scheduled_time = match self.timestamp(&["scheduled_time", "scheduledTime"]) {
            Some(ts) => ts,
            None => {
                warn!(
                    "Flight {} at {} has no usable scheduled time, using current time",
                    flight_number, airport_code
                );
                now
            }
        };

        FlightRecord {
            airline_code: self
                .nested("airline", &["code", "iata", "icao"])
                .or_else(|| self.text(&["airlineCode", "airline_code"]))
                .unwrap_or_else(|| UNKNOWN_AIRLINE_CODE.to_string()),
            airline_name: self
                .nested("airline", &["name"])
                .or_else(|| self.text(&["airlineName", "airline_name"]))
                .or_else(|| self.text(&["airline"]))
                .unwrap_or_else(|| UNKNOWN_AIRLINE_NAME.to_string()),
            origin_code: self
                .nested("origin", &["code", "iata"])
                .or_else(|| self.text(&["originCode", "origin_code", "origin"]))
                .unwrap_or_default(),
            origin_name: self
                .nested("origin", &["name", "city"])
                .or_else(|| self.text(&["originName", "origin_name"]))
                .unwrap_or_default(),
            destination_code: self
                .nested("destination", &["code", "iata"])
                .or_else(|| self.text(&["destinationCode", "destination_code", "destination"]))
                .unwrap_or_default(),
            destination_name: self
                .nested("destination", &["name", "city"])
                .or_else(|| self.text(&["destinationName", "destination_name"]))
                .unwrap_or_default(),
            scheduled_time,
            actual_time: self.timestamp(&["actual_time", "actualTime"]),
            estimated_time: self.timestamp(&["estimated_time", "estimatedTime"]),
            status: self
                .text(&["status"])
                .map(FlightStatus::from)
                .unwrap_or(FlightStatus::Scheduled),
            delay_minutes: self.delay(&["delay", "delayMinutes", "delay_minutes"]),
            airport_code: airport_code.trim().to_uppercase(),
            flight_type,
            cached_at: now,
            source: source.to_string(),
            flight_number,
        }
    }

    /// First non-empty string (or number rendered as text) under any of `keys`.
    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find_map(value_as_text)
    }

    /// First non-empty string under `object.field` for any of `fields`.
    fn nested(&self, object: &str, fields: &[&str]) -> Option<String> {
        let inner = self.fields.get(object)?.as_object()?;
        fields
            .iter()
            .filter_map(|f| inner.get(*f))
            .find_map(value_as_text)
    }

    fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find_map(|v| match v {
                Value::String(s) => parse_timestamp(s),
                Value::Number(n) => n.as_i64().and_then(epoch_to_datetime),
                _ => None,
            })
    }

    fn delay(&self, keys: &[&str]) -> u32 {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round().min(u32::MAX as f64) as u32)
            .unwrap_or(0)
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn epoch_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    // Values this large can only be milliseconds.
    if raw.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

/// Parse the timestamp spellings seen in provider payloads.
///
/// Offsets are honoured; naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M%:z", "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Normalize a whole provider batch.
pub fn normalize_batch(
    raw: &[RawFlight],
    airport_code: &str,
    flight_type: FlightType,
    source: &str,
    now: DateTime<Utc>,
) -> Vec<FlightRecord> {
    raw.iter()
        .map(|r| r.normalize(airport_code, flight_type, source, now))
        .collect()
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;

//! Canonical flight observation types.
//!
//! Every record entering the stores has been normalized into [`FlightRecord`]
//! by the ingestion boundary (see [`super::ingest`]), so nothing below this
//! module needs to know about the provider's field spellings.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a flight relative to the observed airport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlightType {
    #[serde(rename = "arrivals", alias = "arrival")]
    Arrival,
    #[serde(rename = "departures", alias = "departure")]
    Departure,
}

impl FlightType {
    pub const ALL: [FlightType; 2] = [FlightType::Arrival, FlightType::Departure];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightType::Arrival => "arrivals",
            FlightType::Departure => "departures",
        }
    }
}

impl fmt::Display for FlightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arrivals" | "arrival" => Ok(Self::Arrival),
            "departures" | "departure" => Ok(Self::Departure),
            _ => Err(format!("Unknown flight type: {}", s)),
        }
    }
}

/// Operational status reported for a flight.
///
/// Deserialization goes through [`FlightStatus::from_str`], which never
/// fails: spellings the provider is known to use are folded onto one
/// variant and anything else becomes [`FlightStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum FlightStatus {
    Scheduled,
    Active,
    OnTime,
    Landed,
    Delayed,
    Cancelled,
    Diverted,
    Boarding,
    Departed,
    EnRoute,
    Unknown,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "scheduled",
            FlightStatus::Active => "active",
            FlightStatus::OnTime => "on-time",
            FlightStatus::Landed => "landed",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Cancelled => "cancelled",
            FlightStatus::Diverted => "diverted",
            FlightStatus::Boarding => "boarding",
            FlightStatus::Departed => "departed",
            FlightStatus::EnRoute => "en-route",
            FlightStatus::Unknown => "unknown",
        }
    }

    /// Statuses that count towards on-time performance when the delay is small.
    pub fn is_on_time_candidate(&self) -> bool {
        matches!(
            self,
            FlightStatus::OnTime
                | FlightStatus::Scheduled
                | FlightStatus::Landed
                | FlightStatus::Departed
                | FlightStatus::EnRoute
        )
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        let status = match normalized.as_str() {
            "scheduled" | "expected" => Self::Scheduled,
            "active" | "airborne" => Self::Active,
            "on-time" | "ontime" => Self::OnTime,
            "landed" | "arrived" => Self::Landed,
            "delayed" => Self::Delayed,
            "cancelled" | "canceled" => Self::Cancelled,
            "diverted" => Self::Diverted,
            "boarding" | "checkin" | "check-in" | "gateclosed" | "gate-closed" => Self::Boarding,
            "departed" => Self::Departed,
            "en-route" | "enroute" => Self::EnRoute,
            _ => Self::Unknown,
        };
        Ok(status)
    }
}

impl From<String> for FlightStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

/// One observed flight leg at one airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub flight_number: String,
    pub airline_code: String,
    pub airline_name: String,
    #[serde(default)]
    pub origin_code: String,
    #[serde(default)]
    pub origin_name: String,
    #[serde(default)]
    pub destination_code: String,
    #[serde(default)]
    pub destination_name: String,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<DateTime<Utc>>,
    pub status: FlightStatus,
    #[serde(default)]
    pub delay_minutes: u32,
    pub airport_code: String,
    #[serde(rename = "type")]
    pub flight_type: FlightType,
    pub cached_at: DateTime<Utc>,
    pub source: String,
}

impl FlightRecord {
    /// Identity of the flight leg this record describes.
    pub fn key(&self) -> FlightKey {
        FlightKey {
            flight_number: self.flight_number.clone(),
            airport_code: self.airport_code.clone(),
            scheduled_time: self.scheduled_time,
        }
    }

    /// Calendar day (UTC) of the scheduled time.
    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_time.date_naive()
    }

    /// Hour of day (UTC) of the scheduled time, 0..=23.
    pub fn scheduled_hour(&self) -> u32 {
        self.scheduled_time.hour()
    }

    pub fn is_on_time(&self) -> bool {
        self.status.is_on_time_candidate() && self.delay_minutes <= 15
    }

    pub fn is_delayed(&self) -> bool {
        self.status == FlightStatus::Delayed || self.delay_minutes > 15
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == FlightStatus::Cancelled
    }
}

/// Identity tuple of a flight leg: `(flight number, airport, scheduled time)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlightKey {
    pub flight_number: String,
    pub airport_code: String,
    pub scheduled_time: DateTime<Utc>,
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.flight_number,
            self.airport_code,
            self.scheduled_time.to_rfc3339()
        )
    }
}

/// All flights of one airport, type and day captured at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    pub airport_code: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub flight_type: FlightType,
    pub captured_at: DateTime<Utc>,
    pub source: String,
    pub flights: Vec<FlightRecord>,
}

impl DailySnapshot {
    pub fn new(
        airport_code: impl Into<String>,
        date: NaiveDate,
        flight_type: FlightType,
        captured_at: DateTime<Utc>,
        source: impl Into<String>,
        flights: Vec<FlightRecord>,
    ) -> Self {
        Self {
            airport_code: airport_code.into().to_uppercase(),
            date,
            flight_type,
            captured_at,
            source: source.into(),
            flights,
        }
    }

    /// Storage key of the `(airport, date, type)` triple this snapshot covers.
    pub fn storage_key(&self) -> String {
        snapshot_key(&self.airport_code, self.date, self.flight_type)
    }
}

/// Storage key for an `(airport, date, type)` triple.
pub fn snapshot_key(airport_code: &str, date: NaiveDate, flight_type: FlightType) -> String {
    format!(
        "{}|{}|{}",
        airport_code.to_uppercase(),
        date.format("%Y-%m-%d"),
        flight_type.as_str()
    )
}

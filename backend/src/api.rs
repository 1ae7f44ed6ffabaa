//! Public API surface of the statistics engine.
//!
//! This file consolidates the result types returned by the statistics
//! queries and served by the HTTP API. All types derive Serialize/Deserialize
//! for JSON serialization; field names are camelCase on the wire, matching the
//! stored flight records.

pub use crate::db::models::{ArchiveStatistics, CacheStats};
pub use crate::models::{DailySnapshot, FlightRecord, FlightStatus, FlightType};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IATA (3 letters) or ICAO (4 letters) airport code, upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirportCode(String);

impl AirportCode {
    /// Accepts 3 or 4 ASCII letters in upper case.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let valid = (3..=4).contains(&raw.len()) && raw.bytes().all(|b| b.is_ascii_uppercase());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(format!(
                "Invalid airport code '{}': expected 3 or 4 uppercase letters",
                raw
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AirportCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AirportCode> for String {
    fn from(code: AirportCode) -> Self {
        code.0
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =========================================================
// Daily statistics
// =========================================================

/// One hour-of-day bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyStats {
    pub hour: u32,
    pub flights: usize,
    pub average_delay: u32,
    pub on_time_percentage: u32,
}

/// Flight count and punctuality of one airline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirlineStats {
    pub code: String,
    pub name: String,
    pub flights: usize,
    pub on_time_percentage: u32,
    pub average_delay: u32,
}

/// Statistics of one airport on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistics {
    pub airport: String,
    pub date: NaiveDate,
    pub total_flights: usize,
    pub on_time_flights: usize,
    pub delayed_flights: usize,
    pub cancelled_flights: usize,
    /// Mean delay of flights with a positive delay, in minutes.
    pub average_delay: u32,
    pub on_time_percentage: u32,
    /// 0..=100 composite of delay rate and magnitude.
    pub delay_index: u32,
    /// Up to four busiest hours, ascending.
    pub peak_hours: Vec<u32>,
    /// Up to ten airlines by flight count.
    pub top_airlines: Vec<AirlineStats>,
    /// Always 24 buckets.
    pub hourly_distribution: Vec<HourlyStats>,
}

// =========================================================
// Range statistics and trends
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayTrend {
    Worsening,
    Improving,
    Stable,
}

/// First half versus second half of a day sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub traffic_trend: TrafficTrend,
    pub delay_trend: DelayTrend,
    /// Rounded traffic change between the halves, in percent.
    pub trend_percentage: i64,
}

impl Default for TrendSummary {
    fn default() -> Self {
        Self {
            traffic_trend: TrafficTrend::Stable,
            delay_trend: DelayTrend::Stable,
            trend_percentage: 0,
        }
    }
}

/// A day and its on-time percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPerformance {
    pub date: NaiveDate,
    pub on_time_percentage: u32,
}

/// Totals over a whole range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeAggregate {
    pub total_flights: usize,
    pub average_flights_per_day: u32,
    pub overall_on_time_percentage: u32,
    pub overall_delayed_percentage: u32,
    pub overall_average_delay: u32,
    pub best_day: Option<DayPerformance>,
    pub worst_day: Option<DayPerformance>,
}

/// Daily statistics over `[from_date, to_date]` plus aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeStatistics {
    pub airport: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub total_days: usize,
    /// One entry per calendar day, including days without flights.
    pub daily_stats: Vec<DailyStatistics>,
    pub aggregated: RangeAggregate,
    pub trends: TrendSummary,
}

/// Rolling window used by the trend, peak-hour and airline reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisPeriod {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl AnalysisPeriod {
    pub fn days(&self) -> i64 {
        match self {
            AnalysisPeriod::Week => 7,
            AnalysisPeriod::Month => 30,
            AnalysisPeriod::Quarter => 90,
            AnalysisPeriod::Year => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPeriod::Week => "7d",
            AnalysisPeriod::Month => "30d",
            AnalysisPeriod::Quarter => "90d",
            AnalysisPeriod::Year => "365d",
        }
    }
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            "365d" => Ok(Self::Year),
            _ => Err(format!("Unknown analysis period: {} (expected 7d, 30d, 90d or 365d)", s)),
        }
    }
}

/// One day of a trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDataPoint {
    pub date: NaiveDate,
    pub total_flights: usize,
    pub on_time_percentage: u32,
    pub average_delay: u32,
    pub delay_index: u32,
}

/// Observations derived from a trend window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendInsights {
    /// First day versus last day traffic change, in percent.
    pub traffic_change: i64,
    /// First day versus last day average delay change, in percent.
    pub delay_change: i64,
    pub best_performing_day: Option<NaiveDate>,
    pub worst_performing_day: Option<NaiveDate>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub airport: String,
    pub period: AnalysisPeriod,
    pub data_points: Vec<TrendDataPoint>,
    pub trends: TrendSummary,
    pub insights: TrendInsights,
}

// =========================================================
// Comparative analysis
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonType {
    DayOverDay,
    WeekOverWeek,
    MonthOverMonth,
    SameDayLastWeek,
    SameDayLastMonth,
}

impl ComparisonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonType::DayOverDay => "day-over-day",
            ComparisonType::WeekOverWeek => "week-over-week",
            ComparisonType::MonthOverMonth => "month-over-month",
            ComparisonType::SameDayLastWeek => "same-day-last-week",
            ComparisonType::SameDayLastMonth => "same-day-last-month",
        }
    }
}

impl FromStr for ComparisonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day-over-day" => Ok(Self::DayOverDay),
            "week-over-week" => Ok(Self::WeekOverWeek),
            "month-over-month" => Ok(Self::MonthOverMonth),
            "same-day-last-week" => Ok(Self::SameDayLastWeek),
            "same-day-last-month" => Ok(Self::SameDayLastMonth),
            _ => Err(format!("Unknown comparison type: {}", s)),
        }
    }
}

/// Aggregates of one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    /// `"<from> to <to>"`
    pub period: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_flights: usize,
    pub on_time_percentage: u32,
    pub average_delay: u32,
    pub delay_index: u32,
}

/// Percentage change from the previous to the current period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChanges {
    pub traffic_change: f64,
    pub delay_change: f64,
    pub on_time_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeAnalysis {
    pub airport: String,
    pub comparison_type: ComparisonType,
    pub current_period: PeriodStats,
    pub previous_period: PeriodStats,
    pub changes: PeriodChanges,
}

// =========================================================
// Peak hours and airline performance
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficIntensity {
    Low,
    Medium,
    High,
    Peak,
}

/// Average traffic of one hour of day over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyTraffic {
    pub hour: u32,
    /// Flights per day in this hour, one decimal.
    pub average_flights: f64,
    pub average_delay: u32,
    pub traffic_intensity: TrafficIntensity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHoursAnalysis {
    pub airport: String,
    pub period: AnalysisPeriod,
    /// Always 24 entries.
    pub hourly_data: Vec<HourlyTraffic>,
    pub peak_hours: Vec<u32>,
    pub quiet_hours: Vec<u32>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceGrade {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirlinePerformance {
    pub airline_code: String,
    pub airline_name: String,
    pub airport: String,
    pub period: AnalysisPeriod,
    pub total_flights: usize,
    pub on_time_flights: usize,
    pub delayed_flights: usize,
    pub cancelled_flights: usize,
    pub average_delay: u32,
    pub on_time_percentage: u32,
    pub performance_grade: PerformanceGrade,
    pub trend: PerformanceTrend,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;

//! Data Transfer Objects for the HTTP API.
//!
//! Statistics responses are the result types from [`crate::api`] serialized
//! as-is; this module adds the query strings, request bodies and the small
//! envelopes used by the admin endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use crate::api::{
    AirlinePerformance, ArchiveStatistics, CacheStats, ComparativeAnalysis, DailyStatistics,
    FlightRecord, PeakHoursAnalysis, RangeStatistics, TrendAnalysis,
};
pub use crate::db::{IngestReport, RetentionReport};
pub use crate::services::{BackupManifest, BackupStats, RestoreReport};

/// `?date=YYYY-MM-DD`, today when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DailyQuery {
    #[serde(default)]
    pub date: Option<String>,
}

/// `?from=YYYY-MM-DD&to=YYYY-MM-DD`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RangeQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// `?period=7d|30d|90d|365d`, 30d when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeriodQuery {
    #[serde(default)]
    pub period: Option<String>,
}

/// `?type=<comparison>`, day-over-day when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompareQuery {
    #[serde(default, rename = "type")]
    pub comparison_type: Option<String>,
}

/// `?type=arrivals|departures`, both when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlightsQuery {
    #[serde(default, rename = "type")]
    pub flight_type: Option<String>,
}

/// Body of `POST /v1/admin/ingest/{airport}/{type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Provider label stored on every record
    #[serde(default = "default_source")]
    pub source: String,
    /// Provider elements in any of the accepted shapes
    pub flights: Vec<serde_json::Value>,
}

fn default_source() -> String {
    "api".to_string()
}

/// Body of `POST /v1/admin/backups`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateBackupRequest {
    #[serde(default)]
    pub description: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Historical store status
    pub archive: String,
    pub cached_flights: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightsResponse {
    pub airport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_type: Option<String>,
    pub total: usize,
    pub flights: Vec<FlightRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatesResponse {
    pub airport: String,
    /// Newest first
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupListResponse {
    pub backups: Vec<BackupManifest>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub backup_id: String,
    pub valid: bool,
}

/// Response for work started in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAcceptedResponse {
    /// Job ID for tracking the async processing
    pub job_id: String,
    pub message: String,
}

/// Job status response for async processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub kind: crate::services::JobKind,
    pub status: crate::services::JobStatus,
    pub logs: Vec<crate::services::LogEntry>,
    /// Result if completed
    pub result: Option<serde_json::Value>,
}

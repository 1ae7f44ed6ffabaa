//! HTTP handlers for the REST API.
//!
//! Each handler validates its path and query input, then delegates to the
//! stores, the statistics engine or the backup manager.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use chrono::NaiveDate;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;

use super::dto::{
    BackupListResponse, CompareQuery, CreateBackupRequest, DailyQuery, DatesResponse,
    FlightsQuery, FlightsResponse, HealthResponse, IngestRequest, JobAcceptedResponse,
    JobStatusResponse, PeriodQuery, RangeQuery, RemovedResponse, ValidationResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{
    AirlinePerformance, AirportCode, AnalysisPeriod, ArchiveStatistics, CacheStats,
    ComparativeAnalysis, ComparisonType, DailyStatistics, PeakHoursAnalysis, RangeStatistics,
    TrendAnalysis,
};
use crate::db::services as db_services;
use crate::db::{IngestReport, RetentionReport};
use crate::models::time::parse_date;
use crate::models::{FlightType, RawFlight};
use crate::services::{
    spawn_backup_job, spawn_restore_job, BackupError, BackupManifest, BackupStats, JobStatus,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Longest accepted `/stats/range` span, in days between `from` and `to`.
pub const MAX_RANGE_DAYS: i64 = 90;

// =============================================================================
// Input validation
// =============================================================================

fn parse_airport(raw: &str) -> Result<AirportCode, AppError> {
    AirportCode::parse(raw).map_err(AppError::BadRequest)
}

fn date_param(name: &str, raw: &str) -> Result<NaiveDate, AppError> {
    parse_date(raw).ok_or_else(|| {
        AppError::BadRequest(format!("Invalid {} '{}': expected YYYY-MM-DD", name, raw))
    })
}

fn period_param(raw: Option<String>) -> Result<AnalysisPeriod, AppError> {
    match raw {
        Some(p) => p.parse().map_err(AppError::BadRequest),
        None => Ok(AnalysisPeriod::default()),
    }
}

fn flight_type_param(raw: &str) -> Result<FlightType, AppError> {
    raw.parse().map_err(AppError::BadRequest)
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let archive = match db_services::health_check(state.archive.as_ref()).await {
        Ok(true) => "available".to_string(),
        Ok(false) => "unavailable".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        archive,
        cached_flights: state.cache.len(),
    }))
}

// =============================================================================
// Statistics
// =============================================================================

/// GET /v1/airports/{airport}/stats/daily?date=
pub async fn get_daily_stats(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<DailyQuery>,
) -> HandlerResult<DailyStatistics> {
    let airport = parse_airport(&airport_code)?;
    let date = match query.date {
        Some(raw) => date_param("date", &raw)?,
        None => state.cache.now().date_naive(),
    };
    Ok(Json(
        state.statistics.get_daily_statistics(airport.as_str(), date).await,
    ))
}

/// GET /v1/airports/{airport}/stats/range?from=&to=
pub async fn get_range_stats(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<RangeQuery>,
) -> HandlerResult<RangeStatistics> {
    let airport = parse_airport(&airport_code)?;
    let (Some(from), Some(to)) = (query.from, query.to) else {
        return Err(AppError::BadRequest("Both 'from' and 'to' are required".to_string()));
    };
    let from = date_param("from", &from)?;
    let to = date_param("to", &to)?;
    if from > to {
        return Err(AppError::BadRequest(format!("'from' ({}) is after 'to' ({})", from, to)));
    }
    if (to - from).num_days() > MAX_RANGE_DAYS {
        return Err(AppError::BadRequest(format!(
            "Range spans more than {} days",
            MAX_RANGE_DAYS
        )));
    }
    Ok(Json(
        state.statistics.get_range_statistics(airport.as_str(), from, to).await,
    ))
}

/// GET /v1/airports/{airport}/stats/trends?period=
pub async fn get_trends(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> HandlerResult<TrendAnalysis> {
    let airport = parse_airport(&airport_code)?;
    let period = period_param(query.period)?;
    Ok(Json(
        state.statistics.get_trend_analysis(airport.as_str(), period).await,
    ))
}

/// GET /v1/airports/{airport}/stats/compare?type=
pub async fn get_comparison(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<CompareQuery>,
) -> HandlerResult<ComparativeAnalysis> {
    let airport = parse_airport(&airport_code)?;
    let comparison = match query.comparison_type {
        Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
        None => ComparisonType::DayOverDay,
    };
    Ok(Json(
        state
            .statistics
            .get_comparative_analysis(airport.as_str(), comparison)
            .await,
    ))
}

/// GET /v1/airports/{airport}/stats/peak-hours?period=
pub async fn get_peak_hours(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> HandlerResult<PeakHoursAnalysis> {
    let airport = parse_airport(&airport_code)?;
    let period = period_param(query.period)?;
    Ok(Json(
        state.statistics.get_peak_hours_analysis(airport.as_str(), period).await,
    ))
}

/// GET /v1/airports/{airport}/stats/airlines?period=
pub async fn get_airline_performance(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> HandlerResult<Vec<AirlinePerformance>> {
    let airport = parse_airport(&airport_code)?;
    let period = period_param(query.period)?;
    Ok(Json(
        state.statistics.get_airline_performance(airport.as_str(), period).await,
    ))
}

// =============================================================================
// Flights and archive
// =============================================================================

/// GET /v1/airports/{airport}/flights?type=
///
/// Cached flights, newest scheduled first.
pub async fn get_flights(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
    Query(query): Query<FlightsQuery>,
) -> HandlerResult<FlightsResponse> {
    let airport = parse_airport(&airport_code)?;
    let (flight_type, flights) = match query.flight_type {
        Some(raw) => {
            let flight_type = flight_type_param(&raw)?;
            (
                Some(flight_type.to_string()),
                state.cache.get_flight_data(airport.as_str(), flight_type),
            )
        }
        None => (None, state.cache.get_all_flight_data(airport.as_str())),
    };

    Ok(Json(FlightsResponse {
        airport: airport.to_string(),
        flight_type,
        total: flights.len(),
        flights,
    }))
}

/// GET /v1/airports/{airport}/dates
pub async fn get_available_dates(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
) -> HandlerResult<DatesResponse> {
    let airport = parse_airport(&airport_code)?;
    let dates = state.archive.get_available_dates(airport.as_str()).await?;
    Ok(Json(DatesResponse {
        airport: airport.to_string(),
        dates,
    }))
}

/// GET /v1/admin/archive/stats
pub async fn get_archive_stats(State(state): State<AppState>) -> HandlerResult<ArchiveStatistics> {
    Ok(Json(state.archive.get_cache_statistics().await?))
}

// =============================================================================
// Cache administration
// =============================================================================

/// POST /v1/admin/ingest/{airport}/{type}
pub async fn ingest_flights(
    State(state): State<AppState>,
    Path((airport_code, flight_type)): Path<(String, String)>,
    Json(request): Json<IngestRequest>,
) -> HandlerResult<IngestReport> {
    let airport = parse_airport(&airport_code)?;
    let flight_type = flight_type_param(&flight_type)?;
    let raw: Vec<RawFlight> = request.flights.into_iter().map(RawFlight::from).collect();

    let report = db_services::ingest_flights(
        &state.cache,
        state.archive.as_ref(),
        airport.as_str(),
        flight_type,
        &raw,
        &request.source,
    )
    .await?;
    Ok(Json(report))
}

/// GET /v1/admin/cache/stats
pub async fn get_cache_stats(State(state): State<AppState>) -> HandlerResult<CacheStats> {
    Ok(Json(state.cache.get_cache_stats()))
}

/// POST /v1/admin/cache/clean
pub async fn clean_cache(State(state): State<AppState>) -> HandlerResult<RetentionReport> {
    let report = db_services::sweep_retention(
        &state.cache,
        state.archive.as_ref(),
        state.config.archive_retention_days,
    )
    .await?;
    Ok(Json(report))
}

/// DELETE /v1/admin/cache
pub async fn clear_cache(State(state): State<AppState>) -> HandlerResult<RemovedResponse> {
    Ok(Json(RemovedResponse {
        removed: state.cache.clear_all_cache()?,
    }))
}

/// DELETE /v1/admin/cache/{airport}
pub async fn clear_airport_cache(
    State(state): State<AppState>,
    Path(airport_code): Path<String>,
) -> HandlerResult<RemovedResponse> {
    let airport = parse_airport(&airport_code)?;
    Ok(Json(RemovedResponse {
        removed: state.cache.clear_airport_cache(airport.as_str())?,
    }))
}

// =============================================================================
// Backups
// =============================================================================

/// GET /v1/admin/backups
pub async fn list_backups(State(state): State<AppState>) -> HandlerResult<BackupListResponse> {
    let backups: Vec<BackupManifest> = state.backups.list_backups();
    Ok(Json(BackupListResponse {
        total: backups.len(),
        backups,
    }))
}

/// GET /v1/admin/backups/stats
pub async fn get_backup_stats(State(state): State<AppState>) -> HandlerResult<BackupStats> {
    Ok(Json(state.backups.get_backup_stats()))
}

/// POST /v1/admin/backups
///
/// Starts a manual backup in the background and returns its job id.
pub async fn create_backup(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<JobAcceptedResponse>), AppError> {
    let description = if body.iter().all(|b| b.is_ascii_whitespace()) {
        None
    } else {
        serde_json::from_slice::<CreateBackupRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid backup request: {}", e)))?
            .description
    };
    let job_id = spawn_backup_job(state.backups.clone(), state.jobs.clone(), description);
    Ok(accepted("Backup", job_id))
}

/// GET /v1/admin/backups/{backup_id}/validate
pub async fn validate_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<String>,
) -> HandlerResult<ValidationResponse> {
    let valid = state.backups.validate_backup_integrity(&backup_id)?;
    Ok(Json(ValidationResponse { backup_id, valid }))
}

/// POST /v1/admin/backups/{backup_id}/restore
///
/// Unknown or invalid backups are rejected up front; otherwise the restore
/// runs in the background and the job id is returned.
pub async fn restore_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<String>,
) -> Result<(StatusCode, Json<JobAcceptedResponse>), AppError> {
    let manifest = state.backups.get_backup(&backup_id)?;
    if !manifest.is_valid {
        return Err(BackupError::InvalidBackup(backup_id).into());
    }
    let job_id = spawn_restore_job(state.backups.clone(), state.jobs.clone(), backup_id);
    Ok(accepted("Restore", job_id))
}

fn accepted(what: &str, job_id: String) -> (StatusCode, Json<JobAcceptedResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(JobAcceptedResponse {
            message: format!("{} started. Track progress at /v1/admin/jobs/{}", what, job_id),
            job_id,
        }),
    )
}

// =============================================================================
// Async Job Management
// =============================================================================

/// GET /v1/admin/jobs/{job_id}
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .jobs
        .get_job(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        kind: job.kind,
        status: job.status,
        logs: job.logs,
        result: job.result,
    }))
}

/// GET /v1/admin/jobs/{job_id}/logs
///
/// Stream job logs via Server-Sent Events (SSE).
pub async fn stream_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if state.jobs.get_job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("Job {} not found", job_id)));
    }

    let tracker = state.jobs.clone();
    let stream = async_stream::stream! {
        let mut sent = 0;
        loop {
            let logs = tracker.get_logs(&job_id);
            for log in logs.iter().skip(sent) {
                let event_data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(event_data));
            }
            sent = logs.len();

            match tracker.get_job(&job_id) {
                Some(job) if matches!(job.status, JobStatus::Scheduled | JobStatus::Running) => {}
                Some(job) => {
                    let final_event = serde_json::json!({
                        "status": job.status,
                        "result": job.result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(serde_json::to_string(&final_event).unwrap_or_default()));
                    break;
                }
                None => break,
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

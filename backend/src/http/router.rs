//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Statistics
        .route("/airports/{airport}/stats/daily", get(handlers::get_daily_stats))
        .route("/airports/{airport}/stats/range", get(handlers::get_range_stats))
        .route("/airports/{airport}/stats/trends", get(handlers::get_trends))
        .route("/airports/{airport}/stats/compare", get(handlers::get_comparison))
        .route("/airports/{airport}/stats/peak-hours", get(handlers::get_peak_hours))
        .route("/airports/{airport}/stats/airlines", get(handlers::get_airline_performance))
        // Flight data
        .route("/airports/{airport}/flights", get(handlers::get_flights))
        .route("/airports/{airport}/dates", get(handlers::get_available_dates))
        // Cache and archive administration
        .route("/admin/ingest/{airport}/{flight_type}", post(handlers::ingest_flights))
        .route("/admin/cache/stats", get(handlers::get_cache_stats))
        .route("/admin/cache/clean", post(handlers::clean_cache))
        .route("/admin/cache", delete(handlers::clear_cache))
        .route("/admin/cache/{airport}", delete(handlers::clear_airport_cache))
        .route("/admin/archive/stats", get(handlers::get_archive_stats))
        // Backups
        .route(
            "/admin/backups",
            get(handlers::list_backups).post(handlers::create_backup),
        )
        .route("/admin/backups/stats", get(handlers::get_backup_stats))
        .route("/admin/backups/{backup_id}/validate", get(handlers::validate_backup))
        .route("/admin/backups/{backup_id}/restore", post(handlers::restore_backup))
        // Job management
        .route("/admin/jobs/{job_id}", get(handlers::get_job_status))
        .route("/admin/jobs/{job_id}/logs", get(handlers::stream_job_logs));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        // Ingest batches for a busy airport can run to several megabytes.
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! Flight Archive HTTP Server Binary
//!
//! Opens the flight cache and the historical archive, starts the daily
//! backup scheduler and the retention sweeper, and serves the REST API.
//!
//! # Usage
//!
//! ```bash
//! # Run with the file-backed archive under ./data (default)
//! cargo run --bin flight-archive-server
//!
//! # Run with an in-memory archive and a custom data directory
//! FLIGHT_ARCHIVE_STORE=memory FLIGHT_ARCHIVE_DATA_DIR=/tmp/flights \
//!   cargo run --bin flight-archive-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `FLIGHT_ARCHIVE_CONFIG`: Path to a TOML config file
//! - `FLIGHT_ARCHIVE_STORE`: `json` (default) or `memory`
//! - `FLIGHT_ARCHIVE_DATA_DIR`, `FLIGHT_ARCHIVE_RETENTION_DAYS`,
//!   `FLIGHT_ARCHIVE_MAX_BACKUPS`, `FLIGHT_ARCHIVE_BACKUPS_ENABLED`: config overrides
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flight_archive::db::{ArchiveConfig, StoreFactory, StoreType};
use flight_archive::http::{create_router, AppState};
use flight_archive::models::{SharedClock, SystemClock};
use flight_archive::services::{BackupScheduler, JobTracker, RetentionSweeper, SchedulerHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Flight Archive HTTP Server");

    let config = load_config()?;
    info!("Data directory: {}", config.data_dir.display());

    let clock: SharedClock = Arc::new(SystemClock);
    let store_type = StoreType::from_env();
    let archive = StoreFactory::create_archive(store_type, &config)?;
    let cache = StoreFactory::open_cache(&config, clock.clone())?;
    info!("Stores initialized ({:?} archive, {} cached flights)", store_type, cache.len());

    let jobs = JobTracker::with_clock(clock.clone());
    let state = AppState::new(config.clone(), cache.clone(), archive.clone(), clock.clone(), jobs.clone());

    let mut background = SchedulerHandle::new();
    if config.backups_enabled {
        BackupScheduler::new(state.backups.clone(), jobs.clone(), clock.clone())
            .start_with(&mut background);
    } else {
        warn!("Daily backups are disabled");
    }
    RetentionSweeper::new(cache.clone(), archive, jobs)
        .with_interval(Duration::from_secs(config.sweep_interval_secs))
        .with_archive_retention(config.archive_retention_days)
        .with_job_retention(chrono::Duration::hours(config.job_retention_hours))
        .start_with(&mut background);

    let app = create_router(state);

    // Determine bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.stop().await;
    cache.flush()?;
    info!("Flight cache flushed, bye");

    Ok(())
}

/// `FLIGHT_ARCHIVE_CONFIG`, then the default search path, then built-in defaults.
fn load_config() -> anyhow::Result<ArchiveConfig> {
    let config = match env::var("FLIGHT_ARCHIVE_CONFIG") {
        Ok(path) => ArchiveConfig::from_file(&path)?,
        Err(_) => ArchiveConfig::from_default_location().unwrap_or_else(|e| {
            info!("{}; using defaults", e);
            ArchiveConfig::default()
        }),
    };
    Ok(config.apply_env_overrides()?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

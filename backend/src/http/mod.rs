//! HTTP server module for the flight archive.
//!
//! Exposes the statistics engine, the flight stores and the backup manager
//! as a REST API under `/v1`. Long-running admin work (backups, restores)
//! is handed to the job tracker and answered with `202 Accepted`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Path and query validation                              │
//! │  - JSON serialization, SSE job logs                       │
//! │  - CORS, compression, error mapping                       │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! │  - StatisticsEngine, BackupManager, JobTracker            │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Storage Layer (db/)                                      │
//! │  - PersistentFlightCache                                  │
//! │  - JsonArchiveRepository / LocalRepository                │
//! └──────────────────────────────────────────────────────────┘
//! ```

#[cfg(feature = "http-server")]
pub mod handlers;

#[cfg(feature = "http-server")]
pub mod router;

#[cfg(feature = "http-server")]
pub mod state;

#[cfg(feature = "http-server")]
pub mod error;

#[cfg(feature = "http-server")]
pub mod dto;

#[cfg(feature = "http-server")]
pub use router::create_router;

#[cfg(feature = "http-server")]
pub use state::AppState;

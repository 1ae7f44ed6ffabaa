//! Storage layer: the persistent flight cache and the historical archive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, scheduler, backups)       │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Ingestion with write-through archiving               │
//! │  - Retention sweep across both stores                   │
//! └──────────┬────────────────────────────────┬─────────────┘
//!            │                                │
//! ┌──────────▼──────────────┐   ┌─────────────▼─────────────┐
//! │ PersistentFlightCache   │   │ HistoricalRepository trait│
//! │ (flight_cache.rs)       │   │ (repository/)             │
//! └──────────┬──────────────┘   └──────┬──────────────┬─────┘
//!            │                         │              │
//!            │                 ┌───────▼──────┐ ┌─────▼──────────┐
//!            │                 │ JsonArchive  │ │ Local          │
//!            │                 │ (file)       │ │ (in-memory)    │
//!            │                 └───────┬──────┘ └────────────────┘
//!            │                         │
//! ┌──────────▼─────────────────────────▼────────────────────┐
//! │  JsonFileStore (record_store.rs) - atomic JSON files     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The module includes:
//! - `services`: High-level functions spanning both stores
//! - `flight_cache`: Merge-by-identity cache with retention
//! - `repository`: Trait definition for the historical archive
//! - `repositories::json_archive`: File-backed archive
//! - `repositories::local`: In-memory archive for tests and local development
//! - `factory`: Store construction from configuration

pub mod checksum;
pub mod config;
pub mod factory;
pub mod flight_cache;
pub mod models;
pub mod record_store;
pub mod repositories;
pub mod repository;
pub mod services;

// ==================== Service Layer ====================

pub use services::{
    archive_day, health_check, ingest_flights, sweep_retention, IngestReport, RetentionReport,
};

// ==================== Store Exports ====================

pub use checksum::{calculate_checksum, file_checksum};
pub use config::ArchiveConfig;
pub use factory::{StoreFactory, StoreType};
pub use flight_cache::PersistentFlightCache;
pub use models::{ArchiveStatistics, CacheStats, IngestCounts};
pub use record_store::{JsonFileStore, LoadStatus};
pub use repositories::{JsonArchiveRepository, LocalRepository};
pub use repository::{ErrorContext, HistoricalRepository, RepositoryError, RepositoryResult};

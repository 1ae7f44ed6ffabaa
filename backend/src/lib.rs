//! # Flight Archive
//!
//! Persistence and statistics core for airport arrival and departure data.
//!
//! Flight records fetched from upstream providers are merged into a
//! persistent cache with a rolling retention window, archived per day into a
//! historical store, summarized into operational statistics and protected by
//! rotating daily backups. A REST API via Axum fronts all of it.
//!
//! ## Architecture
//!
//! - [`models`]: Flight records, raw provider payloads, clocks and calendar helpers
//! - [`db`]: The persistent flight cache, the historical repository and store wiring
//! - [`services`]: Statistics, backups, scheduling and job tracking
//! - [`api`]: Response types shared by the library and the HTTP layer
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use flight_archive::db::{ArchiveConfig, StoreFactory, StoreType};
//! use flight_archive::models::{SharedClock, SystemClock};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ArchiveConfig::with_data_dir("data");
//! let clock: SharedClock = Arc::new(SystemClock);
//! let archive = StoreFactory::create_archive(StoreType::Json, &config)?;
//! let cache = StoreFactory::open_cache(&config, clock)?;
//! println!("{} cached flights", cache.len());
//! # let _ = archive;
//! # Ok(())
//! # }
//! ```

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod db;
pub mod models;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;

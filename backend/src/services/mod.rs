//! Service layer built on top of the stores.
//!
//! - `history`: read path combining archive snapshots and live cache records
//! - `statistics`: daily, range, trend, comparative, peak-hour and airline reports
//! - `backup`: backup creation, rotation, validation and restore
//! - `scheduler`: midnight backup loop, retention sweeper and tracked job bodies
//! - `job_tracker`: in-memory progress tracking for background work

pub mod backup;
pub mod history;
pub mod job_tracker;
pub mod scheduler;
pub mod statistics;

pub use backup::{
    BackupComponents, BackupError, BackupManager, BackupManifest, BackupResult, BackupStats,
    BackupType, RestoreReport,
};
pub use history::FlightHistory;
pub use job_tracker::{Job, JobKind, JobStatus, JobTracker, LogEntry, LogLevel};
pub use scheduler::{
    run_backup_job, run_restore_job, run_retention_job, spawn_backup_job, spawn_restore_job,
    BackupScheduler, RetentionSweeper, SchedulerHandle,
};
pub use statistics::StatisticsEngine;

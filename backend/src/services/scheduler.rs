//! Background maintenance tasks.
//!
//! - [`BackupScheduler`]: sleeps until the next local midnight, takes a daily
//!   backup, then computes the next midnight again. Recomputing each cycle
//!   keeps the schedule on wall-clock midnight across DST changes.
//! - [`RetentionSweeper`]: applies retention on a fixed interval and drops
//!   finished jobs older than the configured age.
//!
//! Both stop through the same [`SchedulerHandle`].
//!
//! The `run_*_job` functions execute one unit of work and record it in the
//! [`JobTracker`]; the `spawn_*_job` variants return the job id at once and
//! finish in the background, which is what the admin endpoints use.

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::backup::BackupManager;
use super::job_tracker::{JobKind, JobTracker, LogLevel};
use crate::db::repository::HistoricalRepository;
use crate::db::services::sweep_retention;
use crate::db::PersistentFlightCache;
use crate::models::time::until_next_local_midnight;
use crate::models::SharedClock;

/// Stops the background tasks it was given.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every task and wait for them to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        info!("Background tasks stopped");
    }
}

impl Default for SchedulerHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BackupScheduler {
    manager: Arc<BackupManager>,
    jobs: JobTracker,
    clock: SharedClock,
}

impl BackupScheduler {
    pub fn new(manager: Arc<BackupManager>, jobs: JobTracker, clock: SharedClock) -> Self {
        Self { manager, jobs, clock }
    }

    /// Spawn the midnight loop and return a handle that stops it.
    pub fn start(self) -> SchedulerHandle {
        let mut handle = SchedulerHandle::new();
        self.start_with(&mut handle);
        handle
    }

    /// Spawn the midnight loop under an existing handle.
    pub fn start_with(self, handle: &mut SchedulerHandle) {
        let cancel = handle.token();
        handle.attach(tokio::spawn(self.run(cancel)));
    }

    async fn run(self, cancel: CancellationToken) {
        info!("Daily backup scheduler started");
        loop {
            let now = self.clock.now();
            let wait = until_next_local_midnight(now);
            let due = now + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::days(1));
            let job_id = self.jobs.schedule_job(JobKind::ScheduledBackup, due);
            info!("Next daily backup at {} (in {}s)", due.to_rfc3339(), wait.as_secs());

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.jobs.fail_job(&job_id, "Scheduler stopped before the backup was due");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.jobs.start_job(&job_id);
            run_backup(&self.manager, &self.jobs, &job_id, None, true).await;
        }
        info!("Daily backup scheduler stopped");
    }
}

pub struct RetentionSweeper {
    cache: Arc<PersistentFlightCache>,
    archive: Arc<dyn HistoricalRepository>,
    archive_retention_days: Option<i64>,
    interval: Duration,
    job_max_age: chrono::Duration,
    jobs: JobTracker,
}

impl RetentionSweeper {
    pub fn new(
        cache: Arc<PersistentFlightCache>,
        archive: Arc<dyn HistoricalRepository>,
        jobs: JobTracker,
    ) -> Self {
        Self {
            cache,
            archive,
            archive_retention_days: None,
            interval: Duration::from_secs(3600),
            job_max_age: chrono::Duration::hours(24),
            jobs,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn with_archive_retention(mut self, days: Option<i64>) -> Self {
        self.archive_retention_days = days;
        self
    }

    pub fn with_job_retention(mut self, max_age: chrono::Duration) -> Self {
        self.job_max_age = max_age;
        self
    }

    pub fn start_with(self, handle: &mut SchedulerHandle) {
        let cancel = handle.token();
        handle.attach(tokio::spawn(self.run(cancel)));
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            run_retention_job(&self.cache, self.archive.as_ref(), self.archive_retention_days, &self.jobs)
                .await;
            let pruned = self.jobs.prune(self.job_max_age);
            if pruned > 0 {
                info!("Dropped {} finished jobs", pruned);
            }
        }
        info!("Retention sweeper stopped");
    }
}

// =========================================================
// Job bodies
// =========================================================

async fn run_backup(
    manager: &BackupManager,
    jobs: &JobTracker,
    job_id: &str,
    description: Option<String>,
    daily: bool,
) {
    jobs.log(job_id, LogLevel::Info, "Backup started");
    let outcome = if daily {
        manager.create_daily_backup().await
    } else {
        manager.create_manual_backup(description).await
    };
    match outcome {
        Ok(manifest) => {
            let level = if manifest.is_valid { LogLevel::Success } else { LogLevel::Warning };
            jobs.log(job_id, level, manifest.description.clone());
            jobs.complete_job(job_id, serde_json::to_value(&manifest).ok());
        }
        Err(e) => {
            error!("Backup failed: {}", e);
            jobs.fail_job(job_id, format!("Backup failed: {}", e));
        }
    }
}

/// Take a manual backup as a tracked job. Returns the job id.
pub async fn run_backup_job(
    manager: &BackupManager,
    jobs: &JobTracker,
    description: Option<String>,
) -> String {
    let job_id = jobs.create_job(JobKind::ManualBackup);
    run_backup(manager, jobs, &job_id, description, false).await;
    job_id
}

/// Start a manual backup in the background. Returns the job id at once.
pub fn spawn_backup_job(
    manager: Arc<BackupManager>,
    jobs: JobTracker,
    description: Option<String>,
) -> String {
    let job_id = jobs.create_job(JobKind::ManualBackup);
    let id = job_id.clone();
    tokio::spawn(async move { run_backup(&manager, &jobs, &id, description, false).await });
    job_id
}

async fn run_restore(manager: &BackupManager, jobs: &JobTracker, job_id: &str, backup_id: &str) {
    jobs.log(job_id, LogLevel::Info, format!("Restoring from {}", backup_id));
    match manager.restore_from_backup(backup_id).await {
        Ok(report) => {
            if report.failed.is_empty() {
                jobs.log(job_id, LogLevel::Success, "All components restored");
            } else {
                jobs.log(
                    job_id,
                    LogLevel::Warning,
                    format!("Components not restored: {}", report.failed.join(", ")),
                );
            }
            jobs.complete_job(job_id, serde_json::to_value(&report).ok());
        }
        Err(e) => jobs.fail_job(job_id, format!("Restore failed: {}", e)),
    }
}

/// Restore from `backup_id` as a tracked job. Returns the job id.
pub async fn run_restore_job(manager: &BackupManager, jobs: &JobTracker, backup_id: &str) -> String {
    let job_id = jobs.create_job(JobKind::Restore);
    run_restore(manager, jobs, &job_id, backup_id).await;
    job_id
}

/// Start a restore in the background. Returns the job id at once.
pub fn spawn_restore_job(manager: Arc<BackupManager>, jobs: JobTracker, backup_id: String) -> String {
    let job_id = jobs.create_job(JobKind::Restore);
    let id = job_id.clone();
    tokio::spawn(async move { run_restore(&manager, &jobs, &id, &backup_id).await });
    job_id
}

/// Apply retention to both stores as a tracked job. Returns the job id.
pub async fn run_retention_job<R: HistoricalRepository + ?Sized>(
    cache: &PersistentFlightCache,
    archive: &R,
    archive_retention_days: Option<i64>,
    jobs: &JobTracker,
) -> String {
    let job_id = jobs.create_job(JobKind::RetentionSweep);
    match sweep_retention(cache, archive, archive_retention_days).await {
        Ok(report) => {
            if report.cache_records_removed > 0 || report.archive_snapshots_removed > 0 {
                info!(
                    "Retention removed {} cached flights and {} archived snapshots",
                    report.cache_records_removed, report.archive_snapshots_removed
                );
            }
            jobs.complete_job(&job_id, serde_json::to_value(&report).ok());
        }
        Err(e) => {
            warn!("Retention sweep failed: {}", e);
            jobs.fail_job(&job_id, format!("Retention sweep failed: {}", e));
        }
    }
    job_id
}

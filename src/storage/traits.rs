//! Storage traits and error types
//!
//! The engine is handed a storage backend rather than owning one. This module
//! defines that interface and its error type.

use crate::crawler::{ChangeKind, PageSignature};
use crate::job::{CrawlJob, CrawlRunHistory, ExtractedPage, JobCounters, JobId, NewJob};
use crate::state::JobStatus;
use crate::storage::StoredPage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Previous-run content signatures keyed by normalized URL
pub type Snapshot = HashMap<String, PageSignature>;

/// Trait for storage backend implementations
///
/// Calls are synchronous and short. The engine shares one backend between
/// workers behind a mutex, so implementations only need to be `Send`.
pub trait Storage: Send {
    // ===== Jobs =====

    /// Stores a new job in the `idle` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn insert_job(&mut self, job: &NewJob) -> StorageResult<JobId>;

    fn get_job(&self, job_id: JobId) -> StorageResult<Option<CrawlJob>>;

    /// All jobs ordered by ID
    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>>;

    /// Jobs whose status is any of `statuses`
    fn jobs_with_status(&self, statuses: &[JobStatus]) -> StorageResult<Vec<CrawlJob>>;

    // ===== Run Lifecycle =====

    fn set_job_status(&mut self, job_id: JobId, status: JobStatus) -> StorageResult<()>;

    /// Resets the job's counters and records the run start
    ///
    /// Clears `completed_at` so the job reflects the run in progress.
    fn mark_run_started(&mut self, job_id: JobId, started_at: DateTime<Utc>) -> StorageResult<()>;

    /// Sets the final status and completion time of the current run
    fn mark_run_finished(
        &mut self,
        job_id: JobId,
        status: JobStatus,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Adds `delta` to the job's counters
    fn update_job_counters(&mut self, job_id: JobId, delta: &JobCounters) -> StorageResult<()>;

    // ===== Pages =====

    /// Saves one extracted page of a run along with its diff classification
    fn save_page(
        &mut self,
        job_id: JobId,
        run_number: u32,
        page: &ExtractedPage,
        change: ChangeKind,
    ) -> StorageResult<()>;

    /// Pages saved by one run, in save order
    fn pages_for_run(&self, job_id: JobId, run_number: u32) -> StorageResult<Vec<StoredPage>>;

    // ===== Run History =====

    /// Appends a run history record
    ///
    /// Records are never updated; saving the same run number twice is a
    /// constraint violation.
    fn save_run_history(&mut self, record: &CrawlRunHistory) -> StorageResult<()>;

    /// History records of a job ordered by run number
    fn run_history(&self, job_id: JobId) -> StorageResult<Vec<CrawlRunHistory>>;

    /// Highest recorded run number, 0 if the job never ran
    fn latest_run_number(&self, job_id: JobId) -> StorageResult<u32>;

    // ===== Diff Snapshot =====

    /// Signatures of the job's last completed run
    fn load_snapshot(&self, job_id: JobId) -> StorageResult<Snapshot>;

    /// Replaces the job's snapshot; older snapshots are not retained
    fn replace_snapshot(&mut self, job_id: JobId, snapshot: &Snapshot) -> StorageResult<()>;
}

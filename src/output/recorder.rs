//! Run history recording
//!
//! Every run ends with exactly one [`CrawlRunHistory`] record, whether it
//! completed, failed or was cancelled. Records are append-only.

use crate::crawler::DiffSummary;
use crate::job::{duration_ms, CrawlRunHistory, JobCounters, JobId};
use crate::state::JobStatus;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};

/// Builds and persists the history record of one run
#[derive(Debug, Clone, Copy)]
pub struct RunHistoryRecorder {
    job_id: JobId,
    run_number: u32,
    started_at: DateTime<Utc>,
}

impl RunHistoryRecorder {
    pub fn new(job_id: JobId, run_number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            run_number,
            started_at,
        }
    }

    pub fn run_number(&self) -> u32 {
        self.run_number
    }

    /// Assembles the final record
    ///
    /// Removed pages are only meaningful for a run that walked its whole
    /// frontier, so they are reported as zero for any other outcome.
    pub fn build(
        &self,
        status: JobStatus,
        counters: &JobCounters,
        diff: DiffSummary,
        completed_at: DateTime<Utc>,
    ) -> CrawlRunHistory {
        let pages_removed = if status == JobStatus::Completed {
            diff.removed
        } else {
            0
        };

        CrawlRunHistory {
            job_id: self.job_id,
            run_number: self.run_number,
            status,
            pages_successful: counters.pages_successful,
            pages_failed: counters.pages_failed,
            pages_skipped: counters.pages_skipped,
            pages_new: diff.new,
            pages_changed: diff.changed,
            pages_unchanged: diff.unchanged,
            pages_removed,
            total_words: counters.total_words,
            started_at: self.started_at,
            completed_at,
            duration_ms: duration_ms(self.started_at, completed_at),
        }
    }

    /// Persists a record through the storage interface
    ///
    /// # Arguments
    ///
    /// * `storage` - Storage backend the engine was handed
    /// * `record` - A record built by [`RunHistoryRecorder::build`]
    pub fn save<S: Storage + ?Sized>(storage: &mut S, record: &CrawlRunHistory) -> StorageResult<()> {
        storage.save_run_history(record)?;
        tracing::info!(
            "Job {} run {} {}: {} ok, {} failed, {} skipped, {} new, {} changed, {} removed in {}ms",
            record.job_id,
            record.run_number,
            record.status,
            record.pages_successful,
            record.pages_failed,
            record.pages_skipped,
            record.pages_new,
            record.pages_changed,
            record.pages_removed,
            record.duration_ms
        );
        Ok(())
    }
}

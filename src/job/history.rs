use crate::job::JobId;
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics of one finished (or aborted) run
///
/// Append-only: a record is written once at finalization and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRunHistory {
    pub job_id: JobId,
    /// Monotonic per job, starting at 1
    pub run_number: u32,
    /// Completed, Failed or Cancelled
    pub status: JobStatus,
    pub pages_successful: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
    pub pages_new: u64,
    pub pages_changed: u64,
    pub pages_unchanged: u64,
    /// URLs of the previous completed run that this run did not fetch
    pub pages_removed: u64,
    pub total_words: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Milliseconds between two instants, zero if `end` precedes `start`
pub fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

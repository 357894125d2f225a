use crate::state::PageOutcome;
use serde::{Deserialize, Serialize};

/// Progress counters of a job's current (or last) run
///
/// The same type carries increments: workers tally locally and the
/// orchestrator merges the tally into storage with `update_job_counters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounters {
    /// Distinct eligible URLs seen, including ones beyond the page budget
    pub pages_discovered: u64,
    /// Frontier entries popped and processed to an outcome
    pub pages_crawled: u64,
    pub pages_successful: u64,
    pub pages_failed: u64,
    pub pages_skipped: u64,
    pub total_words: u64,
    pub total_links: u64,
    /// Failed fetch attempts, retried ones included
    pub error_count: u64,
}

impl JobCounters {
    /// Counts one popped entry under its outcome
    pub fn record(&mut self, outcome: PageOutcome) {
        self.pages_crawled += 1;
        match outcome {
            PageOutcome::Success => self.pages_successful += 1,
            PageOutcome::Skipped => self.pages_skipped += 1,
            PageOutcome::Failed => self.pages_failed += 1,
        }
    }

    /// Adds another tally into this one
    pub fn merge(&mut self, delta: &JobCounters) {
        self.pages_discovered += delta.pages_discovered;
        self.pages_crawled += delta.pages_crawled;
        self.pages_successful += delta.pages_successful;
        self.pages_failed += delta.pages_failed;
        self.pages_skipped += delta.pages_skipped;
        self.total_words += delta.total_words;
        self.total_links += delta.total_links;
        self.error_count += delta.error_count;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `pagesCrawled = pagesSuccessful + pagesFailed + pagesSkipped`
    pub fn is_balanced(&self) -> bool {
        self.pages_crawled == self.pages_successful + self.pages_failed + self.pages_skipped
    }
}

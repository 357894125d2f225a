//! Crawl job records
//!
//! A [`CrawlJob`] is the long-lived entity a user saves; each run of it
//! produces [`ExtractedPage`]s and, at the end, one [`CrawlRunHistory`].

mod counters;
mod history;
mod page;
mod schedule;

pub use counters::JobCounters;
pub use history::{duration_ms, CrawlRunHistory};
pub use page::{reading_time_minutes, CodeBlock, ExtractedPage, ImageRef, READING_WORDS_PER_MINUTE};
pub use schedule::{Schedule, ScheduleFrequency};

use crate::config::RawJobConfig;
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned job identifier
pub type JobId = i64;

/// A saved crawl configuration together with its run state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: JobId,
    pub name: String,
    pub config: RawJobConfig,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub schedule: Option<Schedule>,
    pub created_at: DateTime<Utc>,
}

/// Definition of a job that has not been stored yet
///
/// This is also the shape of the JSON job files accepted by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub name: String,
    pub config: RawJobConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

impl NewJob {
    pub fn new(name: impl Into<String>, config: RawJobConfig) -> Self {
        Self {
            name: name.into(),
            config,
            schedule: None,
        }
    }
}

//! Job lifecycle states
//!
//! ```text
//! idle -> queued -> running -> { paused, completed, failed, cancelled }
//! paused -> running | cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, never run
    #[default]
    Idle,

    /// Start accepted, workers not yet running
    Queued,

    /// Workers are popping from the frontier
    Running,

    /// Workers stopped popping; the frontier is kept
    Paused,

    // ===== Terminal States =====
    /// Frontier drained or page budget reached
    Completed,

    /// Run aborted by an unrecoverable error or a process restart
    Failed,

    /// Run stopped by request; the frontier was discarded
    Cancelled,
}

impl JobStatus {
    /// States from which a new run may be started
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Running | Self::Queued)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Running | Self::Queued | Self::Paused)
    }

    /// Returns true while a run exists for the job
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Paused)
    }

    /// Returns true for states that end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match next {
            Self::Idle => false,
            Self::Queued => self.can_start(),
            Self::Running => matches!(self, Self::Queued | Self::Paused),
            Self::Paused => self.can_pause(),
            Self::Completed => matches!(self, Self::Running),
            Self::Failed => self.is_active(),
            Self::Cancelled => self.can_cancel(),
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> [Self; 7] {
        [
            Self::Idle,
            Self::Queued,
            Self::Running,
            Self::Paused,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

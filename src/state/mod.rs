//! State module for tracking job and run progress
//!
//! # Components
//!
//! - `JobStatus`: The job lifecycle state machine
//! - `OriginState`: Per-origin request spacing used for politeness
//! - `PageOutcome`: How a single popped frontier entry ended

mod job_status;
mod origin_state;
mod page_outcome;

pub use job_status::JobStatus;
pub use origin_state::OriginState;
pub use page_outcome::PageOutcome;

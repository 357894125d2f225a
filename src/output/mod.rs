//! Output module for run records and reports
//!
//! This module handles:
//! - Building and persisting the per-run history record
//! - Printing job status and run history for the command line

pub mod recorder;
pub mod stats;

pub use recorder::RunHistoryRecorder;
pub use stats::{
    load_statistics, print_job_list, print_run_summary, print_statistics, JobStatistics,
};

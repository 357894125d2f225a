//! Job statistics for the command line
//!
//! This module loads a job together with its run history from the storage
//! layer and prints it in a fixed, human-readable layout.

use crate::job::{CrawlJob, CrawlRunHistory, JobId};
use crate::storage::{Storage, StorageError, StorageResult};

/// A job and its recorded runs
#[derive(Debug, Clone)]
pub struct JobStatistics {
    pub job: CrawlJob,

    /// Oldest run first
    pub history: Vec<CrawlRunHistory>,
}

impl JobStatistics {
    /// Success rate of the current (or last) run in percent
    pub fn success_rate(&self) -> f64 {
        let counters = &self.job.counters;
        if counters.pages_crawled == 0 {
            0.0
        } else {
            counters.pages_successful as f64 / counters.pages_crawled as f64 * 100.0
        }
    }
}

/// Loads a job's statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `job_id` - Job to report on
///
/// # Returns
///
/// * `Ok(JobStatistics)` - Successfully loaded statistics
/// * `Err(StorageError::JobNotFound)` - No such job
pub fn load_statistics<S: Storage + ?Sized>(storage: &S, job_id: JobId) -> StorageResult<JobStatistics> {
    let job = storage
        .get_job(job_id)?
        .ok_or(StorageError::JobNotFound(job_id))?;
    let history = storage.run_history(job_id)?;
    Ok(JobStatistics { job, history })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &JobStatistics) {
    let job = &stats.job;
    let counters = &job.counters;

    println!("=== Job {}: {} ===\n", job.id, job.name);
    println!("Status: {}", job.status);
    println!("Start URL: {}", job.config.start_url);
    if let Some(started) = job.started_at {
        println!("Started: {}", started.to_rfc3339());
    }
    if let Some(completed) = job.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
    println!();

    println!("Current Run:");
    println!("  Discovered: {}", counters.pages_discovered);
    println!("  Crawled:    {}", counters.pages_crawled);
    println!("  Successful: {}", counters.pages_successful);
    println!("  Failed:     {}", counters.pages_failed);
    println!("  Skipped:    {}", counters.pages_skipped);
    println!("  Words:      {}", counters.total_words);
    println!("  Links:      {}", counters.total_links);
    println!("  Errors:     {}", counters.error_count);
    println!(
        "  Success Rate: {:.1}% ({} / {} pages)",
        stats.success_rate(),
        counters.pages_successful,
        counters.pages_crawled
    );
    println!();

    if stats.history.is_empty() {
        println!("No runs recorded.");
        return;
    }

    println!("Run History:");
    println!(
        "  {:>4}  {:<10} {:>6} {:>6} {:>6} {:>5} {:>7} {:>7} {:>9}",
        "Run", "Status", "OK", "Failed", "Skip", "New", "Changed", "Removed", "Duration"
    );
    for record in &stats.history {
        print_history_row(record);
    }
}

fn print_history_row(record: &CrawlRunHistory) {
    println!(
        "  {:>4}  {:<10} {:>6} {:>6} {:>6} {:>5} {:>7} {:>7} {:>8.1}s",
        record.run_number,
        record.status.to_string(),
        record.pages_successful,
        record.pages_failed,
        record.pages_skipped,
        record.pages_new,
        record.pages_changed,
        record.pages_removed,
        record.duration_ms as f64 / 1000.0
    );
}

/// Prints a one-line-per-job listing
pub fn print_job_list(jobs: &[CrawlJob]) {
    if jobs.is_empty() {
        println!("No jobs.");
        return;
    }
    println!("{:>4}  {:<10} {:<24} Start URL", "ID", "Status", "Name");
    for job in jobs {
        println!(
            "{:>4}  {:<10} {:<24} {}",
            job.id,
            job.status.to_string(),
            job.name,
            job.config.start_url
        );
    }
}

/// Prints the record of a finished run
pub fn print_run_summary(record: &CrawlRunHistory) {
    println!("=== Run {} of job {} ===", record.run_number, record.job_id);
    println!("Status:     {}", record.status);
    println!("Successful: {}", record.pages_successful);
    println!("Failed:     {}", record.pages_failed);
    println!("Skipped:    {}", record.pages_skipped);
    println!(
        "Changes:    {} new, {} changed, {} unchanged, {} removed",
        record.pages_new, record.pages_changed, record.pages_unchanged, record.pages_removed
    );
    println!("Words:      {}", record.total_words);
    println!("Duration:   {:.1}s", record.duration_ms as f64 / 1000.0);
}

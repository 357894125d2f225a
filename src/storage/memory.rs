//! In-memory storage implementation
//!
//! Used when the engine is embedded without a database and throughout the
//! tests. Nothing survives the process.

use crate::crawler::ChangeKind;
use crate::job::{CrawlJob, CrawlRunHistory, ExtractedPage, JobCounters, JobId, NewJob};
use crate::state::JobStatus;
use crate::storage::traits::{Snapshot, Storage, StorageError, StorageResult};
use crate::storage::StoredPage;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    next_id: JobId,
    jobs: BTreeMap<JobId, CrawlJob>,
    pages: HashMap<(JobId, u32), Vec<StoredPage>>,
    history: HashMap<JobId, Vec<CrawlRunHistory>>,
    snapshots: HashMap<JobId, Snapshot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn job_mut(&mut self, job_id: JobId) -> StorageResult<&mut CrawlJob> {
        self.jobs
            .get_mut(&job_id)
            .ok_or(StorageError::JobNotFound(job_id))
    }
}

impl Storage for MemoryStorage {
    fn insert_job(&mut self, job: &NewJob) -> StorageResult<JobId> {
        self.next_id += 1;
        let id = self.next_id;
        self.jobs.insert(
            id,
            CrawlJob {
                id,
                name: job.name.clone(),
                config: job.config.clone(),
                status: JobStatus::Idle,
                counters: JobCounters::default(),
                started_at: None,
                completed_at: None,
                schedule: job.schedule.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn get_job(&self, job_id: JobId) -> StorageResult<Option<CrawlJob>> {
        Ok(self.jobs.get(&job_id).cloned())
    }

    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>> {
        Ok(self.jobs.values().cloned().collect())
    }

    fn jobs_with_status(&self, statuses: &[JobStatus]) -> StorageResult<Vec<CrawlJob>> {
        Ok(self
            .jobs
            .values()
            .filter(|job| statuses.contains(&job.status))
            .cloned()
            .collect())
    }

    fn set_job_status(&mut self, job_id: JobId, status: JobStatus) -> StorageResult<()> {
        self.job_mut(job_id)?.status = status;
        Ok(())
    }

    fn mark_run_started(&mut self, job_id: JobId, started_at: DateTime<Utc>) -> StorageResult<()> {
        let job = self.job_mut(job_id)?;
        job.counters = JobCounters::default();
        job.started_at = Some(started_at);
        job.completed_at = None;
        Ok(())
    }

    fn mark_run_finished(
        &mut self,
        job_id: JobId,
        status: JobStatus,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let job = self.job_mut(job_id)?;
        job.status = status;
        job.completed_at = Some(completed_at);
        Ok(())
    }

    fn update_job_counters(&mut self, job_id: JobId, delta: &JobCounters) -> StorageResult<()> {
        self.job_mut(job_id)?.counters.merge(delta);
        Ok(())
    }

    fn save_page(
        &mut self,
        job_id: JobId,
        run_number: u32,
        page: &ExtractedPage,
        change: ChangeKind,
    ) -> StorageResult<()> {
        if !self.jobs.contains_key(&job_id) {
            return Err(StorageError::JobNotFound(job_id));
        }
        let pages = self.pages.entry((job_id, run_number)).or_default();
        pages.retain(|stored| stored.page.url != page.url);
        pages.push(StoredPage {
            run_number,
            change,
            page: page.clone(),
        });
        Ok(())
    }

    fn pages_for_run(&self, job_id: JobId, run_number: u32) -> StorageResult<Vec<StoredPage>> {
        Ok(self
            .pages
            .get(&(job_id, run_number))
            .cloned()
            .unwrap_or_default())
    }

    fn save_run_history(&mut self, record: &CrawlRunHistory) -> StorageResult<()> {
        if !self.jobs.contains_key(&record.job_id) {
            return Err(StorageError::JobNotFound(record.job_id));
        }
        let records = self.history.entry(record.job_id).or_default();
        if records.iter().any(|r| r.run_number == record.run_number) {
            return Err(StorageError::ConstraintViolation(format!(
                "run {} of job {} already recorded",
                record.run_number, record.job_id
            )));
        }
        records.push(record.clone());
        records.sort_by_key(|r| r.run_number);
        Ok(())
    }

    fn run_history(&self, job_id: JobId) -> StorageResult<Vec<CrawlRunHistory>> {
        Ok(self.history.get(&job_id).cloned().unwrap_or_default())
    }

    fn latest_run_number(&self, job_id: JobId) -> StorageResult<u32> {
        Ok(self
            .history
            .get(&job_id)
            .and_then(|records| records.iter().map(|r| r.run_number).max())
            .unwrap_or(0))
    }

    fn load_snapshot(&self, job_id: JobId) -> StorageResult<Snapshot> {
        Ok(self.snapshots.get(&job_id).cloned().unwrap_or_default())
    }

    fn replace_snapshot(&mut self, job_id: JobId, snapshot: &Snapshot) -> StorageResult<()> {
        self.snapshots.insert(job_id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawJobConfig;
    use crate::crawler::DiffSummary;
    use crate::output::RunHistoryRecorder;

    fn failed_run(job_id: JobId, run_number: u32) -> CrawlRunHistory {
        let now = Utc::now();
        RunHistoryRecorder::new(job_id, run_number, now).build(
            JobStatus::Failed,
            &JobCounters::default(),
            DiffSummary::default(),
            now,
        )
    }

    #[test]
    fn test_job_lifecycle() {
        let mut storage = MemoryStorage::new();
        let job_id = storage
            .insert_job(&NewJob::new("docs", RawJobConfig::new("https://docs.example.com")))
            .unwrap();

        storage.set_job_status(job_id, JobStatus::Running).unwrap();
        storage
            .update_job_counters(
                job_id,
                &JobCounters {
                    pages_discovered: 3,
                    ..Default::default()
                },
            )
            .unwrap();

        let job = storage.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.counters.pages_discovered, 3);
        assert_eq!(
            storage.jobs_with_status(&[JobStatus::Running]).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_unknown_job() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.set_job_status(9, JobStatus::Failed),
            Err(StorageError::JobNotFound(9))
        ));
        assert!(storage.get_job(9).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_history_rejected() {
        let mut storage = MemoryStorage::new();
        let job_id = storage
            .insert_job(&NewJob::new("docs", RawJobConfig::new("https://docs.example.com")))
            .unwrap();
        let record = failed_run(job_id, 1);

        storage.save_run_history(&record).unwrap();
        assert!(storage.save_run_history(&record).is_err());
        assert_eq!(storage.latest_run_number(job_id).unwrap(), 1);
    }
}

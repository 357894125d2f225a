//! Job orchestration
//!
//! The [`Engine`] owns the lifecycle of every job it runs:
//!
//! ```text
//! idle ─┐
//! completed ─┤          ┌─> completed
//! failed ────┼─> queued ─> running ─┼─> failed
//! cancelled ─┘     │        ↑  │    └─> cancelled
//!                  └─> paused ─┘
//! ```
//!
//! A run is one spawned task that seeds a [`Frontier`], drives a pool of
//! `maxConcurrent` workers over it and finalizes a run history record. Signals
//! reach the workers through a watch channel, so pause and cancel are
//! cooperative: an attempt already on the wire always finishes.

use crate::config::{CrawlJobConfig, EngineConfig};
use crate::crawler::control::{control_channel, ControlHandle, ControlSender, RunControl};
use crate::crawler::diff::{DiffSummary, DiffTracker};
use crate::crawler::extractor::{extract, ExtractError};
use crate::crawler::fetcher::{build_http_client, build_page_client, Fetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::politeness::{effective_delay, Politeness};
use crate::job::{CrawlJob, JobCounters, JobId, NewJob};
use crate::output::RunHistoryRecorder;
use crate::robots::{collect_sitemap_urls, RobotsCache};
use crate::state::{JobStatus, PageOutcome};
use crate::storage::{Storage, StorageError};
use crate::url::{normalize_url, PatternFilter};
use crate::{EngineError, PageError, Result};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// Pages a worker processes before merging its tally into the job counters
const COUNTER_FLUSH_INTERVAL: u64 = 10;

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_number: u32 },
    /// The job already has a run in flight; nothing was started
    AlreadyRunning,
}

struct ActiveRun {
    control: ControlSender,
    done: watch::Receiver<bool>,
}

type ActiveRuns = Arc<Mutex<HashMap<JobId, ActiveRun>>>;

/// Executes crawl jobs against a storage backend it is handed
pub struct Engine<S: Storage + 'static> {
    storage: Arc<Mutex<S>>,
    config: Arc<EngineConfig>,
    client: Client,
    page_client: Client,
    active: ActiveRuns,
}

impl<S: Storage + 'static> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            config: self.config.clone(),
            client: self.client.clone(),
            page_client: self.page_client.clone(),
            active: self.active.clone(),
        }
    }
}

fn lock_storage<S>(storage: &Mutex<S>) -> std::result::Result<MutexGuard<'_, S>, StorageError> {
    storage
        .lock()
        .map_err(|e| StorageError::Lock(e.to_string()))
}

fn current_status<S: Storage>(storage: &S, job_id: JobId) -> Result<JobStatus> {
    storage
        .get_job(job_id)?
        .map(|job| job.status)
        .ok_or(EngineError::JobNotFound(job_id))
}

impl<S: Storage + 'static> Engine<S> {
    /// Creates an engine that owns `storage`
    pub fn new(storage: S, config: EngineConfig) -> Result<Self> {
        Self::with_shared_storage(Arc::new(Mutex::new(storage)), config)
    }

    /// Creates an engine over storage shared with the caller
    pub fn with_shared_storage(storage: Arc<Mutex<S>>, config: EngineConfig) -> Result<Self> {
        let client = build_http_client(&config.user_agent, &config.fetcher)?;
        let page_client = build_page_client(&config.user_agent, &config.fetcher)?;
        Ok(Self {
            storage,
            config: Arc::new(config),
            client,
            page_client,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn storage(&self) -> Arc<Mutex<S>> {
        self.storage.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Saves a new job in the `idle` state
    pub fn create_job(&self, job: &NewJob) -> Result<JobId> {
        if let Some(schedule) = &job.schedule {
            schedule.validate()?;
        }
        let job_id = lock_storage(&self.storage)?.insert_job(job)?;
        tracing::info!("Created job {} ({})", job_id, job.name);
        Ok(job_id)
    }

    /// Starts a new run of a job
    ///
    /// The job config is resolved first; a config that does not resolve is
    /// rejected with [`EngineError::Config`] and the job is left untouched.
    /// Starting a job that already has a run in flight is a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(StartOutcome::Started)` - A run was spawned
    /// * `Ok(StartOutcome::AlreadyRunning)` - The job is queued or running
    /// * `Err(EngineError::InvalidTransition)` - The job is paused
    pub fn start(&self, job_id: JobId) -> Result<StartOutcome> {
        let mut active = self.active();
        if active.contains_key(&job_id) {
            tracing::warn!("Job {} already has an active run, start ignored", job_id);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let mut storage = lock_storage(&self.storage)?;
        let job = storage
            .get_job(job_id)?
            .ok_or(EngineError::JobNotFound(job_id))?;

        if matches!(job.status, JobStatus::Running | JobStatus::Queued) {
            tracing::warn!("Job {} is {}, start ignored", job_id, job.status);
            return Ok(StartOutcome::AlreadyRunning);
        }
        if !job.status.can_start() {
            return Err(EngineError::InvalidTransition {
                from: job.status,
                to: JobStatus::Queued,
            });
        }

        let config = CrawlJobConfig::resolve(&job.config)?;
        let run_number = storage.latest_run_number(job_id)? + 1;
        let started_at = Utc::now();
        storage.set_job_status(job_id, JobStatus::Queued)?;
        storage.mark_run_started(job_id, started_at)?;
        drop(storage);

        let (control_tx, control) = control_channel();
        let (done_tx, done) = watch::channel(false);
        active.insert(
            job_id,
            ActiveRun {
                control: control_tx,
                done,
            },
        );
        drop(active);

        tracing::info!(
            "Starting run {} of job {} at {} (max {} pages, depth {}, {} workers)",
            run_number,
            job_id,
            config.start_url,
            config.max_pages,
            config.max_depth,
            config.max_concurrent
        );

        let run = RunTask {
            job_id,
            run_number,
            recorder: RunHistoryRecorder::new(job_id, run_number, started_at),
            config: Arc::new(config),
            engine_config: self.config.clone(),
            client: self.client.clone(),
            page_client: self.page_client.clone(),
            storage: self.storage.clone(),
            control,
            active: self.active.clone(),
            done: done_tx,
        };
        tokio::spawn(run.execute());

        Ok(StartOutcome::Started { run_number })
    }

    /// Stops workers from taking new pages; in-flight pages finish
    ///
    /// Pausing a paused job is a no-op.
    pub fn pause(&self, job_id: JobId) -> Result<()> {
        let active = self.active();
        let mut storage = lock_storage(&self.storage)?;
        let status = current_status(&*storage, job_id)?;

        if status == JobStatus::Paused {
            return Ok(());
        }

        match active.get(&job_id) {
            Some(run) if status.can_pause() && run.control.current() != RunControl::Cancel => {
                run.control.send(RunControl::Pause);
                storage.set_job_status(job_id, JobStatus::Paused)?;
                tracing::info!("Paused job {}", job_id);
                Ok(())
            }
            _ => Err(EngineError::InvalidTransition {
                from: status,
                to: JobStatus::Paused,
            }),
        }
    }

    /// Lets a paused run continue from its remaining frontier
    pub fn resume(&self, job_id: JobId) -> Result<()> {
        let active = self.active();
        let mut storage = lock_storage(&self.storage)?;
        let status = current_status(&*storage, job_id)?;

        match (active.get(&job_id), status) {
            (Some(run), JobStatus::Paused) if run.control.current() != RunControl::Cancel => {
                run.control.send(RunControl::Run);
                storage.set_job_status(job_id, JobStatus::Running)?;
                tracing::info!("Resumed job {}", job_id);
                Ok(())
            }
            (Some(_), JobStatus::Running | JobStatus::Queued) => Ok(()),
            _ => Err(EngineError::InvalidTransition {
                from: status,
                to: JobStatus::Running,
            }),
        }
    }

    /// Cancels a run: the remaining frontier is discarded and the run
    /// finalizes as `cancelled` once in-flight pages finish
    pub fn cancel(&self, job_id: JobId) -> Result<()> {
        let active = self.active();
        let storage = lock_storage(&self.storage)?;
        let status = current_status(&*storage, job_id)?;

        match active.get(&job_id) {
            Some(run) if status.can_cancel() => {
                run.control.send(RunControl::Cancel);
                tracing::info!("Cancelling job {}", job_id);
                Ok(())
            }
            None if status == JobStatus::Cancelled => Ok(()),
            _ => Err(EngineError::InvalidTransition {
                from: status,
                to: JobStatus::Cancelled,
            }),
        }
    }

    /// Current state of a job, for polling
    pub fn status(&self, job_id: JobId) -> Result<CrawlJob> {
        lock_storage(&self.storage)?
            .get_job(job_id)?
            .ok_or(EngineError::JobNotFound(job_id))
    }

    pub fn is_active(&self, job_id: JobId) -> bool {
        self.active().contains_key(&job_id)
    }

    /// Waits for the job's active run (if any) to finalize
    pub async fn wait(&self, job_id: JobId) -> Result<CrawlJob> {
        let done = self.active().get(&job_id).map(|run| run.done.clone());
        if let Some(mut done) = done {
            // An error means the run task is gone, which ends the wait as well
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.status(job_id)
    }

    /// Marks runs interrupted by a restart as failed
    ///
    /// Every job persisted as `running`, `queued` or `paused` without a live
    /// run in this engine gets a failed history record and the `failed`
    /// status. The record carries whatever progress the run had flushed.
    /// Nothing is resumed.
    pub fn recover_interrupted_runs(&self) -> Result<Vec<JobId>> {
        let active = self.active();
        let mut storage = lock_storage(&self.storage)?;
        let stale = storage.jobs_with_status(&[
            JobStatus::Running,
            JobStatus::Queued,
            JobStatus::Paused,
        ])?;

        let mut recovered = Vec::new();
        for job in stale.into_iter().filter(|job| !active.contains_key(&job.id)) {
            let now = Utc::now();
            let run_number = storage.latest_run_number(job.id)? + 1;
            // Pages the run saved before it stopped are still attributed to it
            let mut diff = DiffSummary::default();
            for stored in storage.pages_for_run(job.id, run_number)? {
                diff.record(stored.change);
            }
            let record = RunHistoryRecorder::new(job.id, run_number, job.started_at.unwrap_or(now))
                .build(JobStatus::Failed, &job.counters, diff, now);
            RunHistoryRecorder::save(&mut *storage, &record)?;
            storage.mark_run_finished(job.id, JobStatus::Failed, now)?;
            tracing::warn!(
                "Job {} was {} when the engine stopped; run {} marked failed",
                job.id,
                job.status,
                run_number
            );
            recovered.push(job.id);
        }

        Ok(recovered)
    }

    fn active(&self) -> MutexGuard<'_, HashMap<JobId, ActiveRun>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One spawned run of a job
struct RunTask<S: Storage + 'static> {
    job_id: JobId,
    run_number: u32,
    recorder: RunHistoryRecorder,
    config: Arc<CrawlJobConfig>,
    engine_config: Arc<EngineConfig>,
    client: Client,
    page_client: Client,
    storage: Arc<Mutex<S>>,
    control: ControlHandle,
    active: ActiveRuns,
    done: watch::Sender<bool>,
}

impl<S: Storage + 'static> RunTask<S> {
    async fn execute(self) {
        let outcome = self.crawl().await;
        self.finalize(outcome);
    }

    async fn crawl(&self) -> Result<DiffTracker> {
        self.mark_running()?;

        let snapshot = lock_storage(&self.storage)?.load_snapshot(self.job_id)?;
        let politeness = Arc::new(Politeness::new(self.engine_config.fetcher.max_per_origin));
        let frontier = Arc::new(Frontier::new(self.config.max_pages, self.config.max_depth));
        let robots = Arc::new(RobotsCache::new(
            self.client.clone(),
            self.engine_config.user_agent.robots_token(),
        ));
        let shared = Arc::new(RunShared {
            job_id: self.job_id,
            run_number: self.run_number,
            filter: PatternFilter::from_config(&self.config),
            fetcher: Fetcher::new(
                self.page_client.clone(),
                self.config.clone(),
                politeness.clone(),
                robots.clone(),
                frontier.clone(),
                &self.engine_config.fetcher,
            ),
            frontier,
            robots,
            diff: Mutex::new(DiffTracker::new(snapshot)),
            storage: self.storage.clone(),
            client: self.client.clone(),
            config: self.config.clone(),
        });

        let seeded = shared.seed().await;
        shared.flush(&JobCounters {
            pages_discovered: seeded,
            ..Default::default()
        })?;

        let watcher = spawn_cancel_watcher(shared.frontier.clone(), self.control.clone());

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.max_concurrent {
            workers.spawn(worker_loop(shared.clone(), self.control.clone(), worker_id));
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined
                .map_err(|e| EngineError::Internal(format!("worker task failed: {}", e)))
                .and_then(|result| result);
            if let Err(e) = result {
                tracing::error!("Worker of job {} stopped: {}", self.job_id, e);
                shared.frontier.close();
                failure.get_or_insert(e);
            }
        }
        watcher.abort();

        let start_origin = self.config.start_url.origin();
        tracing::info!(
            "Run {} of job {} drained: {} of {} discovered URLs queued, {} left, {} requests to {}, robots.txt for {} origins",
            self.run_number,
            self.job_id,
            shared.frontier.pushed(),
            shared.frontier.discovered(),
            shared.frontier.len(),
            politeness.request_count(&start_origin),
            start_origin,
            shared.robots.len()
        );

        if let Some(e) = failure {
            return Err(e);
        }

        let mut diff = shared.diff();
        Ok(std::mem::replace(&mut *diff, DiffTracker::new(Default::default())))
    }

    /// Moves the job from queued to running unless a pause arrived first
    fn mark_running(&self) -> Result<()> {
        let mut storage = lock_storage(&self.storage)?;
        if self.control.current() == RunControl::Run {
            storage.set_job_status(self.job_id, JobStatus::Running)?;
        }
        Ok(())
    }

    fn finalize(self, outcome: Result<DiffTracker>) {
        let (status, tracker) = match outcome {
            Ok(tracker) if self.control.is_cancelled() => (JobStatus::Cancelled, Some(tracker)),
            Ok(tracker) => (JobStatus::Completed, Some(tracker)),
            Err(e) => {
                tracing::error!("Run {} of job {} failed: {}", self.run_number, self.job_id, e);
                (JobStatus::Failed, None)
            }
        };

        if let Err(e) = self.persist(status, tracker) {
            tracing::error!(
                "Failed to finalize run {} of job {}: {}",
                self.run_number,
                self.job_id,
                e
            );
        }

        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.job_id);
        self.done.send_replace(true);
    }

    fn persist(&self, status: JobStatus, tracker: Option<DiffTracker>) -> Result<()> {
        let completed_at = Utc::now();
        let mut storage = lock_storage(&self.storage)?;

        let counters = storage
            .get_job(self.job_id)?
            .map(|job| job.counters)
            .unwrap_or_default();
        let summary = tracker.as_ref().map(DiffTracker::summary).unwrap_or_default();

        let record = self.recorder.build(status, &counters, summary, completed_at);
        RunHistoryRecorder::save(&mut *storage, &record)?;

        // Only a run that walked its whole frontier becomes the next baseline
        if status == JobStatus::Completed {
            if let Some(tracker) = tracker {
                storage.replace_snapshot(self.job_id, &tracker.into_snapshot())?;
            }
        }

        storage.mark_run_finished(self.job_id, status, completed_at)?;
        Ok(())
    }
}

/// State shared by the workers of one run
struct RunShared<S: Storage + 'static> {
    job_id: JobId,
    run_number: u32,
    config: Arc<CrawlJobConfig>,
    filter: PatternFilter,
    frontier: Arc<Frontier>,
    robots: Arc<RobotsCache>,
    fetcher: Fetcher,
    diff: Mutex<DiffTracker>,
    storage: Arc<Mutex<S>>,
    client: Client,
}

impl<S: Storage + 'static> RunShared<S> {
    /// Queues the start URL and any sitemap URLs, returning how many were new
    async fn seed(&self) -> u64 {
        let mut discovered = 0;
        let start = self.config.start_url.clone();

        if self.frontier.push(FrontierEntry::seed(start.clone(), 0)).first_sighting {
            discovered += 1;
        }

        let policy = self.robots.policy_for(&start.origin()).await;
        let sitemaps = policy.content.sitemaps();
        if sitemaps.is_empty() {
            return discovered;
        }

        let urls = collect_sitemap_urls(&self.client, sitemaps, self.config.max_pages).await;
        tracing::debug!("Sitemaps of {} list {} URLs", start.origin(), urls.len());

        for raw in urls {
            let url = match normalize_url(&raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Ignoring sitemap URL {}: {}", raw, e);
                    continue;
                }
            };
            if self.filter.is_eligible(&url)
                && self.frontier.push(FrontierEntry::seed(url, 1)).first_sighting
            {
                discovered += 1;
            }
        }

        discovered
    }

    /// Processes one popped entry
    ///
    /// Returns None if the run was cancelled before the page was requested;
    /// such an entry is not counted at all.
    async fn visit(
        &self,
        entry: &FrontierEntry,
        control: &ControlHandle,
        tally: &mut JobCounters,
    ) -> Result<Option<PageOutcome>> {
        let url = &entry.url;

        if !self.robots.is_allowed(url).await {
            return Ok(Some(page_error(PageError::RobotsDisallowed {
                url: url.to_string(),
            })));
        }

        let crawl_delay = self.robots.crawl_delay(&url.origin()).await;
        let delay = effective_delay(self.config.request_delay, crawl_delay);

        let fetched = self.fetcher.fetch(url, delay, control).await;
        tally.error_count += u64::from(fetched.failed_attempts);
        let response = match fetched.result {
            Ok(response) => response,
            Err(PageError::Cancelled { .. }) => return Ok(None),
            Err(e) => return Ok(Some(page_error(e))),
        };

        let final_url = &response.final_url;
        let content = match extract(&response.body, &response.content_type, final_url.as_url()) {
            Ok(content) => content,
            Err(ExtractError::UnsupportedContentType(content_type)) => {
                return Ok(Some(page_error(PageError::ContentTypeMismatch {
                    url: url.to_string(),
                    content_type,
                })))
            }
            Err(ExtractError::ParseFailure(message)) => {
                return Ok(Some(page_error(PageError::ParseFailure {
                    url: url.to_string(),
                    message,
                })))
            }
        };

        for link in content.links.iter().filter(|link| self.filter.is_eligible(link)) {
            let push = self.frontier.push(FrontierEntry::discovered(
                link.clone(),
                entry.depth + 1,
                final_url,
            ));
            if push.first_sighting {
                tally.pages_discovered += 1;
            }
        }

        let page = content.into_page(
            final_url,
            entry.depth,
            response.status,
            &response.content_type,
            Utc::now(),
        );
        let change = self.diff().observe(&page);
        lock_storage(&self.storage)?.save_page(self.job_id, self.run_number, &page, change)?;

        tally.total_words += page.raw_word_count;
        tally.total_links += page.links.len() as u64;
        tracing::debug!(
            "Crawled {} (depth {}, {} words, {:?})",
            page.url,
            entry.depth,
            page.raw_word_count,
            change
        );

        Ok(Some(PageOutcome::Success))
    }

    /// Merges a worker's tally into the job counters
    fn flush(&self, tally: &JobCounters) -> Result<()> {
        if tally.is_empty() {
            return Ok(());
        }
        lock_storage(&self.storage)?.update_job_counters(self.job_id, tally)?;
        Ok(())
    }

    fn diff(&self) -> MutexGuard<'_, DiffTracker> {
        self.diff.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn page_error(error: PageError) -> PageOutcome {
    let outcome = PageOutcome::from(&error);
    match outcome {
        PageOutcome::Skipped => tracing::debug!("Skipped: {}", error),
        _ => tracing::warn!("Failed: {}", error),
    }
    outcome
}

async fn worker_loop<S: Storage + 'static>(
    shared: Arc<RunShared<S>>,
    mut control: ControlHandle,
    worker_id: usize,
) -> Result<()> {
    let mut tally = JobCounters::default();
    let mut unflushed = 0;

    loop {
        if control.current() == RunControl::Pause && unflushed > 0 {
            shared.flush(&tally)?;
            tally = JobCounters::default();
            unflushed = 0;
        }
        if !control.wait_until_runnable().await {
            break;
        }

        let entry = tokio::select! {
            entry = shared.frontier.pop() => entry,
            _ = control.changed() => continue,
        };
        let Some(entry) = entry else {
            break;
        };

        let visited = shared.visit(&entry, &control, &mut tally).await;
        shared.frontier.complete();

        if let Some(outcome) = visited? {
            tally.record(outcome);
            unflushed += 1;
        }

        if unflushed >= COUNTER_FLUSH_INTERVAL {
            shared.flush(&tally)?;
            tally = JobCounters::default();
            unflushed = 0;
        }
    }

    shared.flush(&tally)?;
    tracing::debug!("Worker {} of job {} finished", worker_id, shared.job_id);
    Ok(())
}

/// Discards the frontier as soon as the run is cancelled
fn spawn_cancel_watcher(frontier: Arc<Frontier>, mut control: ControlHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if control.is_cancelled() {
                let discarded = frontier.close();
                tracing::info!("Run cancelled, {} queued URLs discarded", discarded);
                break;
            }
            control.changed().await;
        }
    })
}

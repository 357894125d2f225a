//! Per-origin politeness
//!
//! Spacing is enforced per origin, never globally: requests to different
//! origins proceed independently. Each origin also has its own concurrency
//! cap so that a pool of workers converging on one site still honours it.

use crate::state::OriginState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Held for the duration of one request
#[derive(Debug)]
pub struct OriginPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Origin -> next-allowed-time map plus per-origin concurrency caps
///
/// Guarded by its own locks, independent of the frontier's.
#[derive(Debug)]
pub struct Politeness {
    origins: Mutex<HashMap<String, OriginState>>,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
    max_per_origin: usize,
}

impl Politeness {
    pub fn new(max_per_origin: usize) -> Self {
        Self {
            origins: Mutex::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
            max_per_origin: max_per_origin.max(1),
        }
    }

    /// Waits until a request to `origin` may start
    ///
    /// # Arguments
    ///
    /// * `origin` - `scheme://host[:port]`
    /// * `delay` - Minimum spacing between request starts on the origin
    ///
    /// # Returns
    ///
    /// A permit that must be held until the response has been read.
    pub async fn acquire(&self, origin: &str, delay: Duration) -> OriginPermit {
        let semaphore = self.semaphore(origin);
        // The semaphore is never closed, so this only fails in theory
        let permit = semaphore.acquire_owned().await.ok();

        let slot = self
            .origins()
            .entry(origin.to_string())
            .or_default()
            .reserve(Instant::now(), delay);

        let now = Instant::now();
        if slot > now {
            tracing::trace!("Waiting {:?} before next request to {}", slot - now, origin);
            tokio::time::sleep_until(slot.into()).await;
        }

        OriginPermit { _permit: permit }
    }

    /// Pushes the origin's next slot out, e.g. after HTTP 429
    pub fn back_off(&self, origin: &str, wait: Duration) {
        self.origins()
            .entry(origin.to_string())
            .or_default()
            .back_off(Instant::now(), wait);
    }

    /// Requests reserved against `origin` so far
    pub fn request_count(&self, origin: &str) -> u32 {
        self.origins()
            .get(origin)
            .map(|state| state.request_count)
            .unwrap_or(0)
    }

    fn semaphore(&self, origin: &str) -> Arc<Semaphore> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_origin)))
            .clone()
    }

    fn origins(&self) -> MutexGuard<'_, HashMap<String, OriginState>> {
        self.origins.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Effective spacing: the job's delay or the robots.txt crawl-delay, whichever is larger
pub fn effective_delay(request_delay: Duration, crawl_delay: Option<Duration>) -> Duration {
    crawl_delay.map_or(request_delay, |d| d.max(request_delay))
}

//! Run-scoped work queue
//!
//! The frontier is the only structure every worker mutates. Pushes and pops
//! take a short lock; nothing else about page processing is serialized here.
//!
//! Ordering is FIFO by discovery, which makes the crawl breadth-first within
//! a run. With several workers the visit order is only approximately BFS.

use crate::url::NormalizedUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::Notify;

/// A URL waiting to be visited
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: NormalizedUrl,
    pub depth: u32,
    /// Page the URL was found on; None for seeds
    pub discovered_from: Option<String>,
    pub enqueued_at: Instant,
}

impl FrontierEntry {
    pub fn seed(url: NormalizedUrl, depth: u32) -> Self {
        Self {
            url,
            depth,
            discovered_from: None,
            enqueued_at: Instant::now(),
        }
    }

    pub fn discovered(url: NormalizedUrl, depth: u32, from: &NormalizedUrl) -> Self {
        Self {
            url,
            depth,
            discovered_from: Some(from.to_string()),
            enqueued_at: Instant::now(),
        }
    }
}

/// What happened to a pushed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Already queued (or visited) during this run
    Duplicate,
    /// Deeper than the run's depth limit
    TooDeep,
    /// The run already queued its page budget
    BudgetExhausted,
    /// The run was cancelled
    Closed,
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Push {
    pub outcome: PushOutcome,
    /// True the first time this URL is offered in the run
    pub first_sighting: bool,
}

#[derive(Debug)]
struct FrontierInner {
    queue: VecDeque<FrontierEntry>,
    /// URLs queued or otherwise claimed this run
    seen: HashSet<NormalizedUrl>,
    /// Every distinct URL offered this run
    discovered: HashSet<NormalizedUrl>,
    pushed: usize,
    in_flight: usize,
    closed: bool,
}

/// Bounded, deduplicated BFS queue for one run
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    changed: Notify,
    max_pages: usize,
    max_depth: u32,
}

impl Frontier {
    pub fn new(max_pages: usize, max_depth: u32) -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                queue: VecDeque::new(),
                seen: HashSet::new(),
                discovered: HashSet::new(),
                pushed: 0,
                in_flight: 0,
                closed: false,
            }),
            changed: Notify::new(),
            max_pages,
            max_depth,
        }
    }

    /// Offers an entry to the queue
    ///
    /// The entry is dropped if its URL was already seen this run, if it is
    /// deeper than the depth limit, or if the page budget is spent.
    pub fn push(&self, entry: FrontierEntry) -> Push {
        let mut inner = self.lock();
        let first_sighting = inner.discovered.insert(entry.url.clone());

        let outcome = if inner.closed {
            PushOutcome::Closed
        } else if inner.seen.contains(&entry.url) {
            PushOutcome::Duplicate
        } else if entry.depth > self.max_depth {
            PushOutcome::TooDeep
        } else if inner.pushed >= self.max_pages {
            PushOutcome::BudgetExhausted
        } else {
            inner.seen.insert(entry.url.clone());
            inner.pushed += 1;
            inner.queue.push_back(entry);
            PushOutcome::Queued
        };
        drop(inner);

        if outcome == PushOutcome::Queued {
            self.changed.notify_waiters();
        }

        Push {
            outcome,
            first_sighting,
        }
    }

    /// Claims a URL without queueing it (e.g. a redirect target)
    ///
    /// Returns false if the URL was already seen.
    pub fn mark_seen(&self, url: &NormalizedUrl) -> bool {
        self.lock().seen.insert(url.clone())
    }

    /// Pops the next entry, waiting while other workers may still add more
    ///
    /// Returns None once the queue is empty with nothing in flight, or after
    /// [`Frontier::close`]. Every returned entry must be handed back through
    /// [`Frontier::complete`]. Cancel-safe: the entry is claimed in the same
    /// poll that returns it.
    pub async fn pop(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.changed.notified();
            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(entry) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(entry);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Marks a popped entry as fully processed
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Discards the remaining queue and wakes all waiting workers
    pub fn close(&self) -> usize {
        let discarded = {
            let mut inner = self.lock();
            inner.closed = true;
            let discarded = inner.queue.len();
            inner.queue.clear();
            discarded
        };
        self.changed.notify_waiters();
        discarded
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries queued so far, seeds included
    pub fn pushed(&self) -> usize {
        self.lock().pushed
    }

    pub fn discovered(&self) -> usize {
        self.lock().discovered.len()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        // Every critical section leaves the state consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

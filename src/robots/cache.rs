//! Per-run robots.txt cache
//!
//! Each origin's robots.txt is fetched at most once per run. Workers that ask
//! for the same origin concurrently wait on a shared cell instead of issuing
//! duplicate requests.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::NormalizedUrl;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Cached robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }
}

type Slot = Arc<OnceCell<Arc<CachedRobots>>>;

/// Robots policy shared by all workers of one run
///
/// The cache lives exactly as long as the run that created it, so entries
/// never need to expire.
pub struct RobotsCache {
    client: Client,
    product_token: String,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `product_token` - The user agent token matched against `User-agent` lines
    pub fn new(client: Client, product_token: impl Into<String>) -> Self {
        Self {
            client,
            product_token: product_token.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-populates an origin without fetching
    #[cfg(test)]
    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        let slot = self.slot(origin);
        let _ = slot.set(Arc::new(CachedRobots::new(robots)));
    }

    /// Returns the policy for `origin`, fetching it on first use
    pub async fn policy_for(&self, origin: &str) -> Arc<CachedRobots> {
        let slot = self.slot(origin);
        slot.get_or_init(|| async {
            let robots = fetch_robots(&self.client, origin).await;
            tracing::debug!(
                "Cached robots.txt for {} ({} sitemaps)",
                origin,
                robots.sitemaps().len()
            );
            Arc::new(CachedRobots::new(robots))
        })
        .await
        .clone()
    }

    /// Checks whether the engine's user agent may fetch `url`
    pub async fn is_allowed(&self, url: &NormalizedUrl) -> bool {
        let policy = self.policy_for(&url.origin()).await;
        policy.content.is_allowed(url.as_str(), &self.product_token)
    }

    /// Crawl delay declared for the engine's user agent on `origin`
    pub async fn crawl_delay(&self, origin: &str) -> Option<Duration> {
        let policy = self.policy_for(origin).await;
        policy.content.crawl_delay(&self.product_token)
    }

    /// Number of origins with a resolved policy
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.initialized()).count())
            .unwrap_or(0)
    }

    fn slot(&self, origin: &str) -> Slot {
        match self.slots.lock() {
            Ok(mut slots) => slots.entry(origin.to_string()).or_default().clone(),
            // A poisoned map only loses sharing, never correctness
            Err(poisoned) => poisoned
                .into_inner()
                .entry(origin.to_string())
                .or_default()
                .clone(),
        }
    }
}

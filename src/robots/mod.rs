//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt per origin, caches the result for
//! the lifetime of a run, and reads the sitemaps it declares.

mod cache;
mod parser;
mod sitemap;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{ParsedRobots, MAX_CRAWL_DELAY};
pub use sitemap::{collect_sitemap_urls, parse_sitemap, Sitemap, MAX_SITEMAP_FETCHES};

use reqwest::Client;

/// Fetches robots.txt for an origin
///
/// # Arguments
///
/// * `client` - HTTP client carrying the engine's user agent
/// * `origin` - `scheme://host[:port]` with no trailing slash
///
/// # Returns
///
/// The parsed policy. A missing file, a server error, or a network failure
/// all produce an allow-all policy.
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", url, e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("{} returned {}, allowing all", url, status);
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, allowing all", url, e);
            ParsedRobots::allow_all()
        }
    }
}

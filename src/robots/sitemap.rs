//! Sitemap discovery
//!
//! Sitemaps declared in robots.txt are read for seed URLs. A `<sitemapindex>`
//! is followed one level deep; nested indexes below that are ignored.

use regex::Regex;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

/// Upper bound on sitemap documents fetched in one run
pub const MAX_SITEMAP_FETCHES: usize = 10;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// `<urlset>`: page URLs
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: URLs of further sitemaps
    Index(Vec<String>),
}

impl Sitemap {
    pub fn locations(&self) -> &[String] {
        match self {
            Self::UrlSet(locs) | Self::Index(locs) => locs,
        }
    }
}

/// Parses a sitemap XML document
///
/// Only `<loc>` elements are read, matched by local name so that prefixed
/// documents (`<sm:loc>`) parse too. Anything that does not look like a
/// sitemap yields an empty url set.
pub fn parse_sitemap(xml: &str) -> Sitemap {
    let locs = extract_locs(xml);

    if is_index(xml) {
        Sitemap::Index(locs)
    } else {
        Sitemap::UrlSet(locs)
    }
}

fn is_index(xml: &str) -> bool {
    static INDEX: OnceLock<Option<Regex>> = OnceLock::new();
    INDEX
        .get_or_init(|| Regex::new(r"(?i)<(?:[\w.-]+:)?sitemapindex[\s>/]").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(xml))
}

fn extract_locs(xml: &str) -> Vec<String> {
    static LOC: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = LOC
        .get_or_init(|| Regex::new(r"(?is)<(?:[\w.-]+:)?loc\s*>(.*?)</(?:[\w.-]+:)?loc\s*>").ok())
        .as_ref()
    else {
        return Vec::new();
    };

    re.captures_iter(xml)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str().trim();
            let raw = raw
                .strip_prefix("<![CDATA[")
                .and_then(|r| r.strip_suffix("]]>"))
                .unwrap_or(raw)
                .trim();
            (!raw.is_empty()).then(|| unescape_xml(raw))
        })
        .collect()
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fetches the given sitemaps and returns up to `limit` page URLs
///
/// Fetch failures are logged and skipped. At most [`MAX_SITEMAP_FETCHES`]
/// documents are requested.
pub async fn collect_sitemap_urls(client: &Client, sitemaps: &[String], limit: usize) -> Vec<String> {
    let mut pending: VecDeque<(String, bool)> =
        sitemaps.iter().map(|s| (s.clone(), true)).collect();
    let mut requested: HashSet<String> = HashSet::new();
    let mut urls = Vec::new();

    while let Some((location, top_level)) = pending.pop_front() {
        if urls.len() >= limit || requested.len() >= MAX_SITEMAP_FETCHES {
            break;
        }
        if !requested.insert(location.clone()) {
            continue;
        }

        let Some(body) = fetch_text(client, &location).await else {
            continue;
        };

        match parse_sitemap(&body) {
            Sitemap::Index(children) if top_level => {
                tracing::debug!("Sitemap index {} lists {} sitemaps", location, children.len());
                pending.extend(children.into_iter().map(|c| (c, false)));
            }
            Sitemap::Index(_) => {
                tracing::debug!("Ignoring nested sitemap index {}", location);
            }
            Sitemap::UrlSet(locs) => {
                let room = limit.saturating_sub(urls.len());
                urls.extend(locs.into_iter().take(room));
            }
        }
    }

    urls
}

async fn fetch_text(client: &Client, url: &str) -> Option<String> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch sitemap {}: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!("Sitemap {} returned {}", url, response.status());
        return None;
    }

    match response.text().await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Failed to read sitemap {}: {}", url, e);
            None
        }
    }
}

//! Crawl eligibility rules
//!
//! A URL is eligible when it passes, in order: the domain-restriction policy
//! relative to the start host, the include patterns (if any), and the exclude
//! patterns. Content-type eligibility needs response headers and is checked
//! after the fetch.

use crate::config::{CrawlJobConfig, DomainRestriction};
use crate::url::matcher::host_in_scope;
use crate::url::NormalizedUrl;
use regex::Regex;
use std::fmt;

/// An include/exclude rule
///
/// Patterns are compiled as regular expressions. A pattern that is not a
/// valid regex is kept as a plain substring match instead of failing the job.
#[derive(Clone)]
pub enum UrlPattern {
    Regex(Regex),
    Substring(String),
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                tracing::warn!(
                    "Pattern '{}' is not a valid regex ({}), matching as substring",
                    pattern,
                    e
                );
                Self::Substring(pattern.to_string())
            }
        }
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(url),
            Self::Substring(needle) => url.contains(needle.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Regex(regex) => regex.as_str(),
            Self::Substring(needle) => needle,
        }
    }
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(regex) => write!(f, "Regex({:?})", regex.as_str()),
            Self::Substring(needle) => write!(f, "Substring({:?})", needle),
        }
    }
}

/// Why a URL was (or was not) eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    OutOfDomain,
    NotIncluded,
    Excluded,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Pattern filter bound to one job config
///
/// Holds no mutable state, so evaluating the same URL twice always gives the
/// same answer.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    start_host: String,
    restriction: DomainRestriction,
    include: Vec<UrlPattern>,
    exclude: Vec<UrlPattern>,
}

impl PatternFilter {
    pub fn from_config(config: &CrawlJobConfig) -> Self {
        Self {
            start_host: config.start_url.host().to_string(),
            restriction: config.domain_restriction,
            include: config.include_patterns.clone(),
            exclude: config.exclude_patterns.clone(),
        }
    }

    /// Evaluates the eligibility rules in order, returning the first failure
    pub fn evaluate(&self, url: &NormalizedUrl) -> Eligibility {
        if !self.in_domain(url) {
            return Eligibility::OutOfDomain;
        }

        let url_str = url.as_str();

        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(url_str)) {
            return Eligibility::NotIncluded;
        }

        if self.exclude.iter().any(|p| p.is_match(url_str)) {
            return Eligibility::Excluded;
        }

        Eligibility::Eligible
    }

    pub fn is_eligible(&self, url: &NormalizedUrl) -> bool {
        self.evaluate(url).is_eligible()
    }

    /// Domain-restriction check alone (used for redirect targets)
    pub fn in_domain(&self, url: &NormalizedUrl) -> bool {
        host_in_scope(self.restriction, &self.start_host, url.host())
    }
}

/// Convenience wrapper: builds a filter for `config` and evaluates `url`
pub fn is_eligible(url: &NormalizedUrl, config: &CrawlJobConfig) -> bool {
    PatternFilter::from_config(config).is_eligible(url)
}

//! Crawl Engine: executes polite, bounded, resumable crawl jobs
//!
//! A job is a declarative crawl configuration (start URL, URL rules, domain
//! scope, budgets, auth). Each run of a job walks the site breadth-first with a
//! small worker pool, extracts page content, and diffs the result against the
//! previous completed run of the same job.

pub mod config;
pub mod crawler;
pub mod job;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors
///
/// Covers both the engine settings file and the per-job crawl configuration.
/// A job config that fails here is rejected before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse job config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Invalid credential for auth type {auth_type}: {message}")]
    InvalidCredential { auth_type: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Per-page errors
///
/// None of these abort a run. Each one lands in exactly one of the
/// `pagesSkipped` or `pagesFailed` counters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("Content type {content_type} not accepted for {url}")]
    ContentTypeMismatch { url: String, content_type: String },

    #[error("Redirected out of scope: {url} -> {final_url}")]
    OutOfScope { url: String, final_url: String },

    #[error("Redirected to a URL already claimed this run: {url} -> {final_url}")]
    AlreadyClaimed { url: String, final_url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Server error {status} for {url}")]
    ServerError { url: String, status: u16 },

    #[error("Redirect failed for {url}: {message}")]
    Redirect { url: String, message: String },

    #[error("Request rejected with {status} for {url}")]
    AuthRejected { url: String, status: u16 },

    #[error("Failed to parse {url}: {message}")]
    ParseFailure { url: String, message: String },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl PageError {
    /// Returns true if the page should be counted as skipped rather than failed
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::RobotsDisallowed { .. }
                | Self::ContentTypeMismatch { .. }
                | Self::OutOfScope { .. }
                | Self::AlreadyClaimed { .. }
        )
    }

    /// Returns true if the failure is transient and the fetch may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::ServerError { .. }
        )
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlJobConfig, EngineConfig, RawJobConfig};
pub use crawler::{Engine, StartOutcome};
pub use job::{CrawlJob, CrawlRunHistory, ExtractedPage, JobId};
pub use state::JobStatus;
pub use url::{extract_domain, normalize_url, NormalizedUrl};

//! Configuration module
//!
//! Two layers of configuration live here:
//!
//! - [`EngineConfig`]: engine-wide settings (user agent, fetcher tuning,
//!   database path) loaded from a TOML file.
//! - [`RawJobConfig`] / [`CrawlJobConfig`]: the loose JSON-shaped crawl
//!   configuration a job is saved with, and the immutable, fully resolved form
//!   it is turned into when a run starts.
//!
//! # Example
//!
//! ```no_run
//! use crawl_engine::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("engine.toml")).unwrap();
//! println!("Crawling as: {}", config.user_agent.header_value());
//! ```

mod job;
mod parser;
mod types;
mod validation;

// Re-export types
pub use job::{
    AuthConfig, AuthType, CrawlJobConfig, DomainRestriction, RawJobConfig, DEFAULT_CONTENT_TYPES,
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES, DEFAULT_REQUEST_DELAY_MS,
    MAX_CONCURRENT_LIMIT, mime_essence,
};
pub use types::{EngineConfig, FetcherConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

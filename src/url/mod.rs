//! URL handling module
//!
//! This module provides URL normalization, domain extraction, domain-scope
//! matching, and the include/exclude pattern filter that decides whether a
//! discovered URL is eligible for the frontier.

mod domain;
mod filter;
mod matcher;
mod normalize;

pub use domain::{extract_domain, origin_of};
pub use filter::{is_eligible, Eligibility, PatternFilter, UrlPattern};
pub use matcher::{host_in_scope, is_same_or_subdomain};
pub use normalize::{normalize_url, resolve_url, NormalizedUrl};

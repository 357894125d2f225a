//! Job-level crawl configuration
//!
//! [`RawJobConfig`] mirrors the JSON object produced by the configuration UI:
//! every field except `startUrl` is optional and numbers are not yet clamped.
//! [`CrawlJobConfig::resolve`] turns it into the immutable value a run works
//! from. Ambiguous fields are defaulted or clamped once, here, and the result
//! is never re-checked during the run.

use crate::url::{normalize_url, NormalizedUrl, UrlPattern};
use crate::ConfigError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_MAX_DEPTH: u32 = 3;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const MAX_CONCURRENT_LIMIT: usize = 5;
pub const DEFAULT_CONTENT_TYPES: &[&str] = &["text/html"];

/// Which hosts a crawl may leave the start host for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainRestriction {
    /// Exact host match with the start URL
    #[default]
    Same,
    /// The start host or any of its subdomains
    Subdomains,
    /// No host restriction
    Any,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Bearer,
    Cookie,
}

impl AuthType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Bearer => "bearer",
            Self::Cookie => "cookie",
        }
    }
}

/// Crawl configuration as saved by the configuration UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobConfig {
    pub start_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_restriction: Option<DomainRestriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<BTreeMap<String, String>>,
}

impl RawJobConfig {
    /// Minimal config with only a start URL; everything else defaults
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Self::default()
        }
    }

    /// Parses a raw config from its JSON representation
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Resolved credentials
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
    Cookie { value: String },
}

impl AuthConfig {
    fn resolve(auth_type: AuthType, credential: Option<&str>) -> Result<Self, ConfigError> {
        let credential = credential.map(str::trim).filter(|c| !c.is_empty());
        let missing = || ConfigError::InvalidCredential {
            auth_type: auth_type.as_str().to_string(),
            message: "credential is required".to_string(),
        };

        match auth_type {
            AuthType::None => Ok(Self::None),
            AuthType::Bearer => Ok(Self::Bearer {
                token: credential.ok_or_else(missing)?.to_string(),
            }),
            AuthType::Cookie => Ok(Self::Cookie {
                value: credential.ok_or_else(missing)?.to_string(),
            }),
            AuthType::Basic => {
                let credential = credential.ok_or_else(missing)?;
                let (username, password) =
                    credential
                        .split_once(':')
                        .ok_or_else(|| ConfigError::InvalidCredential {
                            auth_type: "basic".to_string(),
                            message: "expected 'user:pass'".to_string(),
                        })?;
                Ok(Self::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
        }
    }

    /// The header this auth method injects, if any
    pub fn header(&self) -> Option<(HeaderName, String)> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => Some((
                AUTHORIZATION,
                format!("Basic {}", BASE64.encode(format!("{}:{}", username, password))),
            )),
            Self::Bearer { token } => Some((AUTHORIZATION, format!("Bearer {}", token))),
            Self::Cookie { value } => Some((COOKIE, value.clone())),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { username, .. } => write!(f, "Basic({}:***)", username),
            Self::Bearer { .. } => write!(f, "Bearer(***)"),
            Self::Cookie { .. } => write!(f, "Cookie(***)"),
        }
    }
}

/// Immutable, fully resolved crawl configuration for one run
#[derive(Debug, Clone)]
pub struct CrawlJobConfig {
    pub start_url: NormalizedUrl,
    pub include_patterns: Vec<UrlPattern>,
    pub exclude_patterns: Vec<UrlPattern>,
    pub domain_restriction: DomainRestriction,
    /// Lowercased MIME essences; `type/*` and `*/*` act as wildcards
    pub content_types: Vec<String>,
    pub max_pages: usize,
    pub max_depth: u32,
    pub request_delay: Duration,
    pub max_concurrent: usize,
    pub auth: AuthConfig,
    /// Custom headers merged with the auth header (auth wins on collision)
    pub headers: HeaderMap,
}

impl CrawlJobConfig {
    /// Validates and normalizes a raw job config
    ///
    /// Numeric fields are clamped rather than rejected. Invalid regex patterns
    /// fall back to substring matching. The start URL, credentials, and
    /// custom headers must be well formed.
    pub fn resolve(raw: &RawJobConfig) -> Result<Self, ConfigError> {
        let start_url = normalize_url(raw.start_url.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("startUrl '{}': {}", raw.start_url, e)))?;

        let include_patterns = compile_patterns(raw.include_patterns.as_deref());
        let exclude_patterns = compile_patterns(raw.exclude_patterns.as_deref());

        let content_types: Vec<String> = raw
            .content_types
            .iter()
            .flatten()
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
            .collect();
        let content_types = if content_types.is_empty() {
            DEFAULT_CONTENT_TYPES.iter().map(|s| s.to_string()).collect()
        } else {
            content_types
        };

        let max_pages = clamp_min(raw.max_pages, DEFAULT_MAX_PAGES as i64, 1, "maxPages") as usize;
        let max_depth = clamp_min(raw.max_depth, DEFAULT_MAX_DEPTH as i64, 1, "maxDepth")
            .min(u32::MAX as i64) as u32;

        let requested_concurrency = raw.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT as i64);
        let max_concurrent = requested_concurrency.clamp(1, MAX_CONCURRENT_LIMIT as i64) as usize;
        if max_concurrent as i64 != requested_concurrency {
            tracing::warn!(
                "maxConcurrent {} clamped to {}",
                requested_concurrency,
                max_concurrent
            );
        }

        let request_delay =
            Duration::from_millis(raw.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS));

        let auth = AuthConfig::resolve(
            raw.auth_type.unwrap_or_default(),
            raw.auth_credential.as_deref(),
        )?;

        let headers = build_headers(raw.custom_headers.as_ref(), &auth)?;

        Ok(Self {
            start_url,
            include_patterns,
            exclude_patterns,
            domain_restriction: raw.domain_restriction.unwrap_or_default(),
            content_types,
            max_pages,
            max_depth,
            request_delay,
            max_concurrent,
            auth,
            headers,
        })
    }

    /// Checks a response Content-Type against the accepted content types
    ///
    /// A missing header is treated as `text/html`.
    pub fn accepts_content_type(&self, content_type: Option<&str>) -> bool {
        let essence = mime_essence(content_type.unwrap_or("text/html"));
        self.content_types.iter().any(|accepted| {
            if accepted == "*/*" {
                return true;
            }
            match accepted.strip_suffix("/*") {
                Some(major) => essence
                    .split_once('/')
                    .is_some_and(|(candidate, _)| candidate == major),
                None => *accepted == essence,
            }
        })
    }
}

/// Lowercased `type/subtype` without parameters
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn compile_patterns(patterns: Option<&[String]>) -> Vec<UrlPattern> {
    patterns
        .unwrap_or_default()
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(UrlPattern::compile)
        .collect()
}

fn clamp_min(value: Option<i64>, default: i64, min: i64, field: &str) -> i64 {
    let value = value.unwrap_or(default);
    if value < min {
        tracing::warn!("{} {} raised to {}", field, value, min);
        min
    } else {
        value
    }
}

fn build_headers(
    custom: Option<&BTreeMap<String, String>>,
    auth: &AuthConfig,
) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    for (name, value) in custom.into_iter().flatten() {
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }

    // Explicit auth always overrides a custom header of the same name
    if let Some((name, value)) = auth.header() {
        let mut header_value =
            HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidHeader {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        header_value.set_sensitive(true);
        headers.insert(name, header_value);
    }

    Ok(headers)
}

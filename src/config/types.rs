use serde::Deserialize;

/// Engine-wide settings shared by every job the engine runs
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }

    /// Token matched against `User-agent:` lines in robots.txt
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// HTTP retrieval settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Whole-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// TCP/TLS connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Attempts per URL for transient failures, including the first one
    pub max_attempts: u32,

    /// First backoff delay; doubled on every further attempt
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay
    pub max_backoff_ms: u64,

    /// Redirect hops followed before giving up
    pub max_redirects: usize,

    /// Concurrent in-flight requests allowed against a single origin
    pub max_per_origin: usize,

    /// Response bodies are truncated beyond this many bytes
    pub max_body_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_attempts: 3,
            backoff_base_ms: 500,
            max_backoff_ms: 10_000,
            max_redirects: 10,
            max_per_origin: 1,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

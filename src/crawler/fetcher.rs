//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for a run, including:
//! - Building the shared HTTP client with the engine's user agent
//! - Per-origin spacing and concurrency through [`Politeness`]
//! - Auth and custom header injection
//! - Retry with exponential backoff for transient failures
//! - Redirects followed hop by hop, each target checked against the job's
//!   scope, patterns and robots.txt before it is requested
//! - Error classification into [`PageError`]

use crate::config::{CrawlJobConfig, FetcherConfig, UserAgentConfig};
use crate::crawler::control::ControlHandle;
use crate::crawler::frontier::Frontier;
use crate::crawler::politeness::Politeness;
use crate::robots::RobotsCache;
use crate::url::{resolve_url, Eligibility, NormalizedUrl, PatternFilter};
use crate::PageError;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A successful response, body already read
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Final URL after redirects
    pub final_url: NormalizedUrl,
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// True if the body was cut at the size limit
    pub truncated: bool,
}

/// Outcome of a fetch including the attempts that failed along the way
#[derive(Debug)]
pub struct Fetched {
    pub result: Result<FetchedResponse, PageError>,
    pub failed_attempts: u32,
}

/// Exponential backoff settings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `fetcher` - Timeouts and redirect limit
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use crawl_engine::config::{FetcherConfig, UserAgentConfig};
/// use crawl_engine::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "DocsBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetcher: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    client_builder(user_agent, fetcher)
        .redirect(Policy::limited(fetcher.max_redirects))
        .build()
}

/// Builds the client used for pages, which never follows redirects itself
///
/// [`Fetcher`] walks redirect chains so every hop can be checked before it
/// is requested.
pub fn build_page_client(
    user_agent: &UserAgentConfig,
    fetcher: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    client_builder(user_agent, fetcher)
        .redirect(Policy::none())
        .build()
}

fn client_builder(user_agent: &UserAgentConfig, fetcher: &FetcherConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_millis(fetcher.request_timeout_ms))
        .connect_timeout(Duration::from_millis(fetcher.connect_timeout_ms))
        .gzip(true)
        .brotli(true)
}

/// Per-run fetcher bound to one resolved job config
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<CrawlJobConfig>,
    filter: PatternFilter,
    politeness: Arc<Politeness>,
    robots: Arc<RobotsCache>,
    frontier: Arc<Frontier>,
    retry: RetryPolicy,
    max_redirects: usize,
    max_body_bytes: usize,
}

impl Fetcher {
    /// Creates a fetcher for one run
    ///
    /// # Arguments
    ///
    /// * `client` - A client built by [`build_page_client`]
    /// * `config` - The run's resolved job config
    /// * `politeness` - Per-origin spacing shared by the run's workers
    /// * `robots` - The run's robots.txt cache, consulted for redirect targets
    /// * `frontier` - The run's frontier; redirect targets are claimed in it
    /// * `settings` - Retry, redirect and body size limits
    pub fn new(
        client: Client,
        config: Arc<CrawlJobConfig>,
        politeness: Arc<Politeness>,
        robots: Arc<RobotsCache>,
        frontier: Arc<Frontier>,
        settings: &FetcherConfig,
    ) -> Self {
        let filter = PatternFilter::from_config(&config);
        Self {
            client,
            config,
            filter,
            politeness,
            robots,
            frontier,
            retry: RetryPolicy::from_config(settings),
            max_redirects: settings.max_redirects,
            max_body_bytes: settings.max_body_bytes,
        }
    }

    /// Fetches a URL with politeness, auth and retry
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 429 | Push the origin back, then retry with backoff |
    /// | Other 4xx/3xx | Immediate → AuthRejected |
    /// | Timeout / connection error | Retry with backoff |
    /// | Too many redirects | Immediate → Redirect |
    /// | Redirect target out of scope or excluded | Immediate → OutOfScope (skipped) |
    /// | Redirect target disallowed by robots.txt | Immediate → RobotsDisallowed (skipped) |
    /// | Redirect target already claimed this run | Immediate → AlreadyClaimed (skipped) |
    /// | Content-Type not accepted | Immediate → ContentTypeMismatch (skipped) |
    ///
    /// Cancellation is checked before every attempt; an attempt already on
    /// the wire is allowed to finish.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `delay` - Minimum spacing between requests to the URL's origin
    /// * `control` - Run control, consulted before each attempt
    pub async fn fetch(&self, url: &NormalizedUrl, delay: Duration, control: &ControlHandle) -> Fetched {
        let origin = url.origin();
        let mut failed_attempts = 0;
        // Redirect targets this fetch claimed, so a retry may revisit them
        let mut claimed = HashSet::from([url.clone()]);

        for attempt in 1..=self.retry.max_attempts {
            if control.is_cancelled() {
                return Fetched {
                    result: Err(PageError::Cancelled {
                        url: url.to_string(),
                    }),
                    failed_attempts,
                };
            }

            let result = {
                let _permit = self.politeness.acquire(&origin, delay).await;
                self.attempt(url, &mut claimed).await
            };

            let error = match result {
                Ok(response) => {
                    return Fetched {
                        result: Ok(response),
                        failed_attempts,
                    }
                }
                Err(error) => error,
            };

            if error.is_skip() {
                return Fetched {
                    result: Err(error),
                    failed_attempts,
                };
            }

            failed_attempts += 1;
            if !error.is_retryable() || attempt == self.retry.max_attempts {
                return Fetched {
                    result: Err(error),
                    failed_attempts,
                };
            }

            let wait = self.retry.backoff(attempt);
            if matches!(error, PageError::ServerError { status: 429, .. }) {
                self.politeness.back_off(&origin, wait);
            }
            tracing::debug!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt,
                self.retry.max_attempts,
                url,
                error,
                wait
            );
            tokio::time::sleep(wait).await;
        }

        // max_attempts is at least 1, so the loop always returns
        Fetched {
            result: Err(PageError::Network {
                url: url.to_string(),
                message: "no attempt made".to_string(),
            }),
            failed_attempts,
        }
    }

    async fn attempt(
        &self,
        url: &NormalizedUrl,
        claimed: &mut HashSet<NormalizedUrl>,
    ) -> Result<FetchedResponse, PageError> {
        let mut final_url = url.clone();
        let mut hops = 0;

        let response = loop {
            let response = self
                .client
                .get(final_url.as_str())
                .headers(self.config.headers.clone())
                .send()
                .await
                .map_err(|e| classify_error(url, e))?;

            let Some(target) = redirect_target(url, &final_url, &response)? else {
                break response;
            };

            hops += 1;
            if hops > self.max_redirects {
                return Err(PageError::Redirect {
                    url: url.to_string(),
                    message: format!("more than {} redirects", self.max_redirects),
                });
            }
            self.check_redirect(url, &target, claimed).await?;
            tracing::debug!("{} redirected to {}", final_url, target);
            final_url = target;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !self.config.accepts_content_type(content_type.as_deref()) {
            return Err(PageError::ContentTypeMismatch {
                url: url.to_string(),
                content_type: content_type.unwrap_or_default(),
            });
        }

        let (body, truncated) = read_body(response, self.max_body_bytes)
            .await
            .map_err(|e| classify_error(url, e))?;
        if truncated {
            tracing::debug!("Body of {} truncated at {} bytes", url, self.max_body_bytes);
        }

        Ok(FetchedResponse {
            final_url,
            status: status.as_u16(),
            content_type: content_type.unwrap_or_else(|| "text/html".to_string()),
            body,
            truncated,
        })
    }

    /// Applies the checks a discovered link would have faced to a redirect target
    async fn check_redirect(
        &self,
        url: &NormalizedUrl,
        target: &NormalizedUrl,
        claimed: &mut HashSet<NormalizedUrl>,
    ) -> Result<(), PageError> {
        let eligibility = self.filter.evaluate(target);
        if eligibility != Eligibility::Eligible {
            tracing::debug!("Redirect {} -> {} not followed: {:?}", url, target, eligibility);
            return Err(PageError::OutOfScope {
                url: url.to_string(),
                final_url: target.to_string(),
            });
        }

        if !self.robots.is_allowed(target).await {
            return Err(PageError::RobotsDisallowed {
                url: target.to_string(),
            });
        }

        if !claimed.contains(target) {
            if !self.frontier.mark_seen(target) {
                return Err(PageError::AlreadyClaimed {
                    url: url.to_string(),
                    final_url: target.to_string(),
                });
            }
            claimed.insert(target.clone());
        }

        Ok(())
    }
}

/// Location of a redirect response, resolved against the URL that produced it
///
/// A 3xx without a usable Location is not treated as a redirect.
fn redirect_target(
    url: &NormalizedUrl,
    current: &NormalizedUrl,
    response: &Response,
) -> Result<Option<NormalizedUrl>, PageError> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    let Some(location) = response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };

    resolve_url(current.as_url(), location)
        .map(Some)
        .map_err(|e| PageError::Redirect {
            url: url.to_string(),
            message: format!("invalid Location '{}': {}", location, e),
        })
}

/// Reads at most `limit` bytes of the body
async fn read_body(mut response: Response, limit: usize) -> Result<(String, bool), reqwest::Error> {
    let mut bytes = Vec::new();
    let mut truncated = false;

    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(bytes.len());
        if chunk.len() > room {
            bytes.extend_from_slice(&chunk[..room]);
            truncated = true;
            break;
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok((String::from_utf8_lossy(&bytes).into_owned(), truncated))
}

fn classify_status(url: &NormalizedUrl, status: StatusCode) -> PageError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        PageError::ServerError {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        PageError::AuthRejected {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}

fn classify_error(url: &NormalizedUrl, error: reqwest::Error) -> PageError {
    if error.is_timeout() {
        PageError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_redirect() {
        PageError::Redirect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        PageError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawJobConfig;
    use crate::crawler::control::{control_channel, RunControl};
    use crate::url::normalize_url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn fast_settings() -> FetcherConfig {
        FetcherConfig {
            backoff_base_ms: 5,
            max_backoff_ms: 20,
            ..FetcherConfig::default()
        }
    }

    fn fetcher_for(raw: RawJobConfig, settings: &FetcherConfig) -> Fetcher {
        fetcher_with_frontier(raw, settings, Arc::new(Frontier::new(100, 3)))
    }

    fn fetcher_with_frontier(
        raw: RawJobConfig,
        settings: &FetcherConfig,
        frontier: Arc<Frontier>,
    ) -> Fetcher {
        let config = Arc::new(CrawlJobConfig::resolve(&raw).unwrap());
        let user_agent = test_user_agent();
        let client = build_page_client(&user_agent, settings).unwrap();
        let robots = RobotsCache::new(
            build_http_client(&user_agent, settings).unwrap(),
            user_agent.robots_token(),
        );
        Fetcher::new(
            client,
            config,
            Arc::new(Politeness::new(1)),
            Arc::new(robots),
            frontier,
            settings,
        )
    }

    fn page_url(server: &MockServer, p: &str) -> NormalizedUrl {
        normalize_url(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&test_user_agent(), &FetcherConfig::default()).is_ok());
        assert!(build_page_client(&test_user_agent(), &FetcherConfig::default()).is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_fetch_success_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .and(header("authorization", "Bearer t0ken"))
            .and(header("x-team", "docs"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>hi</p>", "text/html"))
            .mount(&server)
            .await;

        let mut raw = RawJobConfig::new(server.uri());
        raw.auth_type = Some(crate::config::AuthType::Bearer);
        raw.auth_credential = Some("t0ken".to_string());
        raw.custom_headers = Some([("X-Team".to_string(), "docs".to_string())].into());
        raw.request_delay_ms = Some(0);

        let fetcher = fetcher_for(raw, &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/doc"), Duration::ZERO, &control)
            .await;

        let response = fetched.result.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<p>hi</p>");
        assert_eq!(fetched.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/flaky"), Duration::ZERO, &control)
            .await;

        assert!(matches!(
            fetched.result,
            Err(PageError::ServerError { status: 503, .. })
        ));
        assert_eq!(fetched.failed_attempts, 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/secret"), Duration::ZERO, &control)
            .await;

        assert!(matches!(
            fetched.result,
            Err(PageError::AuthRejected { status: 401, .. })
        ));
        assert_eq!(fetched.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_content_type_mismatch_is_skip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/logo.png"), Duration::ZERO, &control)
            .await;

        let error = fetched.result.unwrap_err();
        assert!(error.is_skip());
        assert!(matches!(error, PageError::ContentTypeMismatch { .. }));
        assert_eq!(fetched.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_body_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(100), "text/html"))
            .mount(&server)
            .await;

        let settings = FetcherConfig {
            max_body_bytes: 10,
            ..fast_settings()
        };
        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &settings);
        let (_tx, control) = control_channel();
        let response = fetcher
            .fetch(&page_url(&server, "/big"), Duration::ZERO, &control)
            .await
            .result
            .unwrap();

        assert!(response.truncated);
        assert_eq!(response.body.len(), 10);
    }

    #[tokio::test]
    async fn test_cancelled_before_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (tx, control) = control_channel();
        tx.send(RunControl::Cancel);

        let fetched = fetcher
            .fetch(&page_url(&server, "/"), Duration::ZERO, &control)
            .await;
        assert!(matches!(fetched.result, Err(PageError::Cancelled { .. })));
    }

    fn redirect_to(location: &str) -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header("location", location)
    }

    #[tokio::test]
    async fn test_redirect_followed_in_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(redirect_to("/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>moved</p>", "text/html"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let response = fetcher
            .fetch(&page_url(&server, "/old"), Duration::ZERO, &control)
            .await
            .result
            .unwrap();

        assert_eq!(response.final_url, page_url(&server, "/new"));
        assert_eq!(response.body, "<p>moved</p>");
    }

    #[tokio::test]
    async fn test_redirect_to_excluded_target_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(redirect_to("/login"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut raw = RawJobConfig::new(server.uri());
        raw.exclude_patterns = Some(vec!["login".to_string()]);
        let fetcher = fetcher_for(raw, &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/go"), Duration::ZERO, &control)
            .await;

        let error = fetched.result.unwrap_err();
        assert!(matches!(error, PageError::OutOfScope { .. }));
        assert!(error.is_skip());
        assert_eq!(fetched.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_redirect_to_robots_disallowed_target_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /private/\n", "text/plain"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(redirect_to("/private/area"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/private/area"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/go"), Duration::ZERO, &control)
            .await;

        assert!(matches!(
            fetched.result,
            Err(PageError::RobotsDisallowed { .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_loop_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(redirect_to("/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(redirect_to("/a"))
            .mount(&server)
            .await;

        let settings = FetcherConfig {
            max_redirects: 3,
            ..fast_settings()
        };
        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &settings);
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/a"), Duration::ZERO, &control)
            .await;

        let error = fetched.result.unwrap_err();
        assert!(matches!(error, PageError::Redirect { .. }));
        assert!(!error.is_skip());
        assert_eq!(fetched.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_redirect_to_claimed_url_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alias"))
            .respond_with(redirect_to("/target"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/target"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let frontier = Arc::new(Frontier::new(100, 3));
        assert!(frontier.mark_seen(&page_url(&server, "/target")));
        let fetcher = fetcher_with_frontier(
            RawJobConfig::new(server.uri()),
            &fast_settings(),
            frontier,
        );
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/alias"), Duration::ZERO, &control)
            .await;

        let error = fetched.result.unwrap_err();
        assert!(matches!(error, PageError::AlreadyClaimed { .. }));
        assert!(error.is_skip());
    }

    #[tokio::test]
    async fn test_retry_keeps_own_redirect_claim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(redirect_to("/busy"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(RawJobConfig::new(server.uri()), &fast_settings());
        let (_tx, control) = control_channel();
        let fetched = fetcher
            .fetch(&page_url(&server, "/start"), Duration::ZERO, &control)
            .await;

        let response = fetched.result.unwrap();
        assert_eq!(response.final_url, page_url(&server, "/busy"));
        assert_eq!(fetched.failed_attempts, 1);
    }
}

//! Integration tests for the crawl engine
//!
//! These tests use wiremock to create mock HTTP servers and drive whole runs
//! through the engine end-to-end.

use crawl_engine::config::{
    AuthType, DomainRestriction, EngineConfig, FetcherConfig, OutputConfig, RawJobConfig,
    UserAgentConfig,
};
use crawl_engine::crawler::ChangeKind;
use crawl_engine::job::{CrawlJob, NewJob};
use crawl_engine::storage::{MemoryStorage, SqliteStorage, Storage};
use crawl_engine::{Engine, JobId, JobStatus, StartOutcome};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_engine_config() -> EngineConfig {
    EngineConfig {
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        fetcher: FetcherConfig {
            request_timeout_ms: 5_000,
            backoff_base_ms: 10,
            max_backoff_ms: 50,
            ..FetcherConfig::default()
        },
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

fn memory_engine() -> Engine<MemoryStorage> {
    Engine::new(MemoryStorage::new(), test_engine_config()).unwrap()
}

/// Job config pointed at the mock server, with no politeness delay
fn job_config(server: &MockServer) -> RawJobConfig {
    let mut raw = RawJobConfig::new(server.uri());
    raw.request_delay_ms = Some(0);
    raw
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}

fn links(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
        .collect()
}

async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
        .mount(server)
        .await;
}

/// Paths of every non-robots request the server received, in order
async fn page_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .filter(|p| p != "/robots.txt")
        .collect()
}

async fn wait_for_requests(server: &MockServer, at_least: usize) {
    for _ in 0..500 {
        if page_requests(server).await.len() >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never received {} page requests", at_least);
}

async fn run_to_end<S: Storage + 'static>(engine: &Engine<S>, job_id: JobId) -> CrawlJob {
    let outcome = engine.start(job_id).unwrap();
    assert!(matches!(outcome, StartOutcome::Started { .. }));
    tokio::time::timeout(Duration::from_secs(30), engine.wait(job_id))
        .await
        .expect("run did not finish in time")
        .unwrap()
}

fn add_job<S: Storage + 'static>(engine: &Engine<S>, raw: RawJobConfig) -> JobId {
    engine.create_job(&NewJob::new("test job", raw)).unwrap()
}

#[tokio::test]
async fn test_budget_bounded_crawl_with_exclusion() {
    let server = MockServer::start().await;

    let mut children: Vec<String> = (1..=15).map(|i| format!("/page{}", i)).collect();
    children.push("/login".to_string());
    mount_page(&server, "/", page("Home", &links(&children))).await;
    for i in 1..=15 {
        mount_page(
            &server,
            &format!("/page{}", i),
            page(&format!("Page {}", i), "<p>leaf</p>"),
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let json = format!(
        r#"{{"startUrl": "{}", "maxPages": 10, "maxDepth": 2, "domainRestriction": "same",
            "excludePatterns": ["login"], "requestDelayMs": 0}}"#,
        server.uri()
    );
    let engine = memory_engine();
    let job_id = add_job(&engine, RawJobConfig::from_json(&json).unwrap());

    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let requests = page_requests(&server).await;
    assert_eq!(requests.len(), 10);
    assert!(!requests.iter().any(|p| p == "/login"));

    assert_eq!(job.counters.pages_successful, 10);
    assert!(job.counters.pages_discovered >= 15);
    assert!(job.counters.is_balanced());

    let pages = engine.storage().lock().unwrap().pages_for_run(job_id, 1).unwrap();
    assert_eq!(pages.len(), 10);
    assert!(pages.iter().all(|stored| stored.page.depth <= 2));
}

#[tokio::test]
async fn test_robots_disallowed_counted_as_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /private/\n", "text/plain"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        page("Home", &links(&["/private/x".to_string(), "/public".to_string()])),
    )
    .await;
    mount_page(&server, "/public", page("Public", "<p>open</p>")).await;
    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = memory_engine();
    let job_id = add_job(&engine, job_config(&server));
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.pages_successful, 2);
    assert_eq!(job.counters.pages_skipped, 1);
    assert_eq!(job.counters.pages_failed, 0);
    assert_eq!(job.counters.pages_crawled, 3);
}

#[tokio::test]
async fn test_diff_across_two_runs() {
    let server = MockServer::start().await;
    let home = |nav: &[&str]| {
        let nav: Vec<String> = nav.iter().map(|p| p.to_string()).collect();
        page("Home", &format!("<nav>{}</nav><main><p>Welcome home</p></main>", links(&nav)))
    };

    mount_page(&server, "/", home(&["/b", "/c"])).await;
    mount_page(&server, "/b", page("B", "<p>first version</p>")).await;
    mount_page(&server, "/c", page("C", "<p>soon gone</p>")).await;

    let engine = memory_engine();
    let job_id = add_job(&engine, job_config(&server));
    let first = run_to_end(&engine, job_id).await;
    assert_eq!(first.status, JobStatus::Completed);

    server.reset().await;
    mount_page(&server, "/", home(&["/b", "/d"])).await;
    mount_page(&server, "/b", page("B", "<p>second version, longer</p>")).await;
    mount_page(&server, "/d", page("D", "<p>brand new</p>")).await;

    let second = run_to_end(&engine, job_id).await;
    assert_eq!(second.status, JobStatus::Completed);

    let storage = engine.storage();
    let storage = storage.lock().unwrap();
    let history = storage.run_history(job_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].run_number, 1);
    assert_eq!(history[0].pages_new, 3);

    let run2 = &history[1];
    assert_eq!(run2.run_number, 2);
    assert_eq!(run2.pages_new, 1);
    assert_eq!(run2.pages_changed, 1);
    assert_eq!(run2.pages_unchanged, 1);
    assert_eq!(run2.pages_removed, 1);
    assert_eq!(run2.pages_successful, 3);

    let changes: HashMap<String, ChangeKind> = storage
        .pages_for_run(job_id, 2)
        .unwrap()
        .into_iter()
        .map(|stored| (stored.page.url, stored.change))
        .collect();
    let base = server.uri();
    assert_eq!(changes[&format!("{}/", base)], ChangeKind::Unchanged);
    assert_eq!(changes[&format!("{}/b", base)], ChangeKind::Changed);
    assert_eq!(changes[&format!("{}/d", base)], ChangeKind::New);
}

#[tokio::test]
async fn test_pause_and_resume_without_refetch() {
    let server = MockServer::start().await;
    let children: Vec<String> = (1..=6).map(|i| format!("/p{}", i)).collect();
    mount_page(&server, "/", page("Home", &links(&children))).await;
    for child in &children {
        mount_page(&server, child, page(child, "<p>content</p>")).await;
    }

    let mut raw = job_config(&server);
    raw.request_delay_ms = Some(150);
    raw.max_concurrent = Some(1);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);

    engine.start(job_id).unwrap();
    wait_for_requests(&server, 2).await;
    engine.pause(job_id).unwrap();
    engine.pause(job_id).unwrap();
    assert_eq!(engine.status(job_id).unwrap().status, JobStatus::Paused);

    // Let the in-flight page finish, then verify nothing new is requested
    tokio::time::sleep(Duration::from_millis(400)).await;
    let while_paused = page_requests(&server).await.len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(page_requests(&server).await.len(), while_paused);
    assert!(while_paused < 7);
    assert!(engine.is_active(job_id));

    // Progress made before the pause is visible while paused
    let paused = engine.status(job_id).unwrap();
    assert_eq!(paused.counters.pages_successful, while_paused as u64);
    assert!(paused.counters.is_balanced());

    engine.resume(job_id).unwrap();
    let job = tokio::time::timeout(Duration::from_secs(30), engine.wait(job_id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.pages_successful, 7);

    let requests = page_requests(&server).await;
    let mut per_path: HashMap<&str, usize> = HashMap::new();
    for p in &requests {
        *per_path.entry(p.as_str()).or_default() += 1;
    }
    assert_eq!(per_path.len(), 7);
    assert!(per_path.values().all(|&count| count == 1));
}

#[tokio::test]
async fn test_cancel_discards_frontier_and_records_history() {
    let server = MockServer::start().await;
    let children: Vec<String> = (1..=10).map(|i| format!("/c{}", i)).collect();
    mount_page(&server, "/", page("Home", &links(&children))).await;
    for child in &children {
        mount_page(&server, child, page(child, "<p>content</p>")).await;
    }

    let mut raw = job_config(&server);
    raw.request_delay_ms = Some(150);
    raw.max_concurrent = Some(1);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);

    engine.start(job_id).unwrap();
    wait_for_requests(&server, 2).await;
    engine.cancel(job_id).unwrap();

    let job = tokio::time::timeout(Duration::from_secs(30), engine.wait(job_id))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.completed_at.is_some());
    assert!(page_requests(&server).await.len() < 11);
    assert!(job.counters.is_balanced());

    let history = engine.storage().lock().unwrap().run_history(job_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Cancelled);
    assert_eq!(history[0].pages_removed, 0);

    // A cancelled job may be started again
    assert!(matches!(
        engine.start(job_id).unwrap(),
        StartOutcome::Started { run_number: 2 }
    ));
    engine.cancel(job_id).unwrap();
    engine.wait(job_id).await.unwrap();
}

#[tokio::test]
async fn test_single_flight_start() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", "<p>only page</p>")).await;

    let mut raw = job_config(&server);
    raw.request_delay_ms = Some(100);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);

    assert_eq!(
        engine.start(job_id).unwrap(),
        StartOutcome::Started { run_number: 1 }
    );
    assert_eq!(engine.start(job_id).unwrap(), StartOutcome::AlreadyRunning);

    let job = engine.wait(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(page_requests(&server).await.len(), 1);

    assert_eq!(
        engine.start(job_id).unwrap(),
        StartOutcome::Started { run_number: 2 }
    );
    engine.wait(job_id).await.unwrap();
    assert_eq!(
        engine.storage().lock().unwrap().latest_run_number(job_id).unwrap(),
        2
    );
}

#[tokio::test]
async fn test_auth_and_custom_headers_injected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(header("x-docs-team", "platform"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page("Private", "<p>ok</p>"), "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut raw = job_config(&server);
    raw.auth_type = Some(AuthType::Basic);
    raw.auth_credential = Some("user:pass".to_string());
    raw.custom_headers = Some(
        [
            ("Authorization".to_string(), "Bearer overridden".to_string()),
            ("X-Docs-Team".to_string(), "platform".to_string()),
        ]
        .into(),
    );

    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 1);
    assert_eq!(job.counters.pages_failed, 0);
}

#[tokio::test]
async fn test_rejected_request_fails_without_retry() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &links(&["/secret".to_string()]))).await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let engine = memory_engine();
    let job_id = add_job(&engine, job_config(&server));
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.pages_successful, 1);
    assert_eq!(job.counters.pages_failed, 1);
    assert_eq!(job.counters.error_count, 1);
}

#[tokio::test]
async fn test_depth_limit_never_exceeded() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Root", &links(&["/d1".to_string()]))).await;
    mount_page(&server, "/d1", page("D1", &links(&["/d2".to_string()]))).await;
    mount_page(&server, "/d2", page("D2", &links(&["/d3".to_string()]))).await;
    Mock::given(method("GET"))
        .and(path("/d3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut raw = job_config(&server);
    raw.max_depth = Some(2);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 3);
    let pages = engine.storage().lock().unwrap().pages_for_run(job_id, 1).unwrap();
    let max_depth = pages.iter().map(|stored| stored.page.depth).max();
    assert_eq!(max_depth, Some(2));
}

#[tokio::test]
async fn test_same_domain_restriction() {
    let server = MockServer::start().await;
    let port = url::Url::parse(&server.uri()).unwrap().port().unwrap();
    let external = format!("http://localhost:{}/elsewhere", port);
    mount_page(
        &server,
        "/",
        page("Home", &links(&[external, "/inside".to_string()])),
    )
    .await;
    mount_page(&server, "/inside", page("Inside", "<p>in scope</p>")).await;

    let mut raw = job_config(&server);
    raw.domain_restriction = Some(DomainRestriction::Same);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 2);
    assert!(!page_requests(&server).await.iter().any(|p| p == "/elsewhere"));

    let pages = engine.storage().lock().unwrap().pages_for_run(job_id, 1).unwrap();
    assert!(pages
        .iter()
        .all(|stored| stored.page.url.starts_with(&server.uri())));
}

#[tokio::test]
async fn test_sitemap_urls_seed_the_frontier() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n", base),
            "text/plain",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0"?><urlset><url><loc>{}/orphan</loc></url></urlset>"#,
                base
            ),
            "application/xml",
        ))
        .mount(&server)
        .await;
    mount_page(&server, "/", page("Home", "<p>no links</p>")).await;
    mount_page(&server, "/orphan", page("Orphan", "<p>only in sitemap</p>")).await;

    let engine = memory_engine();
    let job_id = add_job(&engine, job_config(&server));
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 2);
    assert!(page_requests(&server).await.iter().any(|p| p == "/orphan"));
}

#[tokio::test]
async fn test_sqlite_backed_run_and_restart_recovery() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &links(&["/a".to_string()]))).await;
    mount_page(&server, "/a", page("A", "<p>alpha</p>")).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("jobs.db");

    let (finished, interrupted) = {
        let storage = SqliteStorage::new(&db_path).unwrap();
        let engine = Engine::new(storage, test_engine_config()).unwrap();
        let finished = add_job(&engine, job_config(&server));
        let job = run_to_end(&engine, finished).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.counters.pages_successful, 2);

        // Simulate a process dying mid-run
        let interrupted = add_job(&engine, job_config(&server));
        {
            let storage = engine.storage();
            let mut storage = storage.lock().unwrap();
            storage.set_job_status(interrupted, JobStatus::Running).unwrap();
            storage
                .mark_run_started(interrupted, chrono::Utc::now())
                .unwrap();
        }
        (finished, interrupted)
    };

    let engine = Engine::new(SqliteStorage::new(&db_path).unwrap(), test_engine_config()).unwrap();
    assert_eq!(engine.recover_interrupted_runs().unwrap(), vec![interrupted]);

    assert_eq!(engine.status(interrupted).unwrap().status, JobStatus::Failed);
    assert_eq!(engine.status(finished).unwrap().status, JobStatus::Completed);

    let storage = engine.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.pages_for_run(finished, 1).unwrap().len(), 2);
    assert_eq!(storage.load_snapshot(finished).unwrap().len(), 2);
    let history = storage.run_history(interrupted).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Failed);
}

fn redirect(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("location", location)
}

#[tokio::test]
async fn test_redirect_into_excluded_path_not_followed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &links(&["/go".to_string()]))).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(redirect("/login"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page("Login", "<p>sign in</p>"), "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let mut raw = job_config(&server);
    raw.exclude_patterns = Some(vec!["login".to_string()]);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.pages_successful, 1);
    assert_eq!(job.counters.pages_skipped, 1);
    assert_eq!(job.counters.pages_failed, 0);
    assert!(job.counters.is_balanced());

    let pages = engine.storage().lock().unwrap().pages_for_run(job_id, 1).unwrap();
    assert!(!pages.iter().any(|stored| stored.page.url.contains("/login")));
}

#[tokio::test]
async fn test_redirect_off_domain_skipped() {
    let server = MockServer::start().await;
    let port = url::Url::parse(&server.uri()).unwrap().port().unwrap();
    mount_page(&server, "/", page("Home", &links(&["/out".to_string()]))).await;
    Mock::given(method("GET"))
        .and(path("/out"))
        .respond_with(redirect(&format!("http://localhost:{}/elsewhere", port)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut raw = job_config(&server);
    raw.domain_restriction = Some(DomainRestriction::Same);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 1);
    assert_eq!(job.counters.pages_skipped, 1);
    assert_eq!(job.counters.error_count, 0);
    assert!(job.counters.is_balanced());
}

#[tokio::test]
async fn test_redirect_to_queued_url_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        page("Home", &links(&["/alias".to_string(), "/target".to_string()])),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/alias"))
        .respond_with(redirect("/target"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/target"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page("Target", "<p>once</p>"), "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let mut raw = job_config(&server);
    raw.max_concurrent = Some(1);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_crawled, 3);
    assert_eq!(job.counters.pages_successful, 2);
    assert_eq!(job.counters.pages_skipped, 1);
    assert!(job.counters.is_balanced());

    let pages = engine.storage().lock().unwrap().pages_for_run(job_id, 1).unwrap();
    let target = format!("{}/target", server.uri());
    assert_eq!(pages.iter().filter(|stored| stored.page.url == target).count(), 1);
}

#[tokio::test]
async fn test_robots_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("User-agent: *\nCrawl-delay: 0.3\n", "text/plain"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        page("Home", &links(&["/one".to_string(), "/two".to_string()])),
    )
    .await;
    mount_page(&server, "/one", page("One", "<p>1</p>")).await;
    mount_page(&server, "/two", page("Two", "<p>2</p>")).await;

    let mut raw = job_config(&server);
    raw.max_concurrent = Some(3);
    let engine = memory_engine();
    let job_id = add_job(&engine, raw);

    let started = std::time::Instant::now();
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.counters.pages_successful, 3);
    // Three requests to one origin leave at least two crawl-delay gaps
    assert!(started.elapsed() >= Duration::from_millis(550));
}

#[tokio::test]
async fn test_mixed_outcomes_balance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("User-agent: *\nDisallow: /private\n", "text/plain"),
        )
        .mount(&server)
        .await;
    let children = ["/ok", "/flaky", "/missing", "/private"].map(String::from);
    mount_page(&server, "/", page("Home", &links(&children))).await;
    mount_page(&server, "/ok", page("Ok", "<p>fine</p>")).await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = memory_engine();
    let job_id = add_job(&engine, job_config(&server));
    let job = run_to_end(&engine, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.pages_crawled, 5);
    assert_eq!(job.counters.pages_successful, 2);
    assert_eq!(job.counters.pages_failed, 2);
    assert_eq!(job.counters.pages_skipped, 1);
    assert_eq!(job.counters.error_count, 4);
    assert!(job.counters.is_balanced());

    let history = engine.storage().lock().unwrap().run_history(job_id).unwrap();
    assert_eq!(history[0].pages_failed, 2);
    assert_eq!(history[0].pages_skipped, 1);
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl, extract and search cycle end-to-end.

use record_sweep::config::{Config, RobotsMode};
use record_sweep::crawler::{CrawlEngine, CrawlScheduler};
use record_sweep::output::load_status;
use record_sweep::search::SearchService;
use record_sweep::storage::{SqliteStorage, Storage};
use record_sweep::JobStatus;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with the given seeds and database
fn create_test_config(seeds: Vec<String>, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.seeds = seeds;
    config.crawler.max_depth = 2;
    config.crawler.min_crawl_delay_secs = 0.0;
    config.fetcher.rendering = false;
    config.storage.database_path = db_path.display().to_string();
    config
}

fn open_db(db_path: &Path) -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::new(db_path).expect("Failed to open DB"))
}

async fn mount_html(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

const STAFF_TABLE: &str = r#"<html><body>
    <table>
      <tr><th>Name</th><th>Phone</th><th>Department</th></tr>
      <tr><td>Asma Khan</td><td>0300-1234567</td><td>Physics</td></tr>
      <tr><td>Bilal Ahmed</td><td>0321-7654321</td><td>Chemistry</td></tr>
    </table>
    <a href="/">Home</a>
</body></html>"#;

#[tokio::test]
async fn test_full_crawl_extracts_and_searches_records() {
    // Start a mock server
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    mount_html(
        &mock_server,
        "/",
        r#"<html><body>
            <a href="/staff">Staff</a>
            <a href="/contact">Contact</a>
            <a href="/login">Login</a>
            <a href="https://elsewhere.example/">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_html(&mock_server, "/staff", STAFF_TABLE).await;
    mount_html(
        &mock_server,
        "/contact",
        r#"<html><body><ul>
            <li>Sara Malik, 03001112223, Model College</li>
        </ul></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let seed = format!("{}/", base_url);
    let config = create_test_config(vec![seed.clone()], &db_path);
    let store = open_db(&db_path);

    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    let pages = engine.crawl_seeds(&config.seeds, config.crawler.max_depth).await;

    // /, /staff and /contact
    assert_eq!(pages, 3, "Expected 3 pages, got {}", pages);

    let seed_job = store.get_job(&seed).unwrap().expect("Seed job missing");
    assert_eq!(seed_job.status, JobStatus::Completed);
    assert_eq!(seed_job.pages_crawled, 3);

    let service = SearchService::from_config(&config.storage, store.clone());
    let mut attributes = BTreeMap::new();
    attributes.insert("name".to_string(), "asma".to_string());
    let found = service.search_by_attributes(&attributes, 10).unwrap();
    assert_eq!(found.len(), 1);
    let record = &found[0].record;
    assert_eq!(record.phone.as_deref(), Some("03001234567"));
    assert_eq!(record.source_url, format!("{}/staff", base_url));
    assert_eq!(record.metadata.get("department").map(String::as_str), Some("Physics"));

    let mut attributes = BTreeMap::new();
    attributes.insert("institution".to_string(), "model college".to_string());
    let found = service.search_by_attributes(&attributes, 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.name.as_deref(), Some("Sara Malik"));
}

#[tokio::test]
async fn test_recrawl_does_not_duplicate_records() {
    let mock_server = MockServer::start().await;
    mount_html(&mock_server, "/staff", STAFF_TABLE).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let seed = format!("{}/staff", mock_server.uri());
    let config = create_test_config(vec![seed.clone()], &db_path);

    for _ in 0..2 {
        let store = open_db(&db_path);
        let engine = CrawlEngine::new(&config, store).expect("Failed to create engine");
        engine.crawl_seeds(&config.seeds, 0).await;
    }

    let store = open_db(&db_path);
    let report = load_status(store.as_ref()).unwrap();
    assert_eq!(report.total_records, 2);
    assert_eq!(report.crawl_jobs, 1);

    let last = report.last_crawl.expect("No completed crawl");
    assert_eq!(last.url, seed);
    assert_eq!(last.pages_crawled, 1);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;

    // Chain: / -> /level1 -> /level2 -> /level3
    mount_html(&mock_server, "/", r#"<a href="/level1">1</a>"#).await;
    mount_html(&mock_server, "/level1", r#"<a href="/level2">2</a>"#).await;
    mount_html(&mock_server, "/level2", r#"<a href="/level3">3</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/level3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let config = create_test_config(vec![format!("{}/", mock_server.uri())], &db_path);
    let store = open_db(&db_path);

    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    let pages = engine.crawl_seeds(&config.seeds, 2).await;

    assert_eq!(pages, 3, "Expected exactly 3 pages");
    assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 3);
}

#[tokio::test]
async fn test_link_cycle_crawled_once() {
    let mock_server = MockServer::start().await;

    for (page, links) in [
        ("/", r#"<a href="/a">a</a><a href="/b">b</a>"#),
        ("/a", r#"<a href="/b">b</a><a href="/">home</a>"#),
        ("/b", r#"<a href="/a">a</a><a href="/">home</a>"#),
    ] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_string(links))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let mut config = create_test_config(vec![format!("{}/", mock_server.uri())], &db_path);
    config.crawler.max_depth = 5;
    let store = open_db(&db_path);

    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    assert_eq!(engine.crawl_seeds(&config.seeds, 5).await, 3);
    assert_eq!(store.count_jobs().unwrap(), 3);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        "/",
        r#"<a href="/public">Public</a><a href="/private/list">Private</a>"#,
    )
    .await;
    mount_html(&mock_server, "/public", "<p>open</p>").await;
    mount_html(&mock_server, "/private/list", STAFF_TABLE).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    // Strict mode skips the disallowed page
    let strict_path = dir.path().join("strict.db");
    let mut config = create_test_config(vec![format!("{}/", mock_server.uri())], &strict_path);
    config.crawler.robots_mode = RobotsMode::Strict;
    let store = open_db(&strict_path);
    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    assert_eq!(engine.crawl_seeds(&config.seeds, 1).await, 2);
    assert_eq!(store.count_records().unwrap(), 0);

    // Permissive mode crawls it anyway
    let permissive_path = dir.path().join("permissive.db");
    let config = create_test_config(vec![format!("{}/", mock_server.uri())], &permissive_path);
    let store = open_db(&permissive_path);
    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    assert_eq!(engine.crawl_seeds(&config.seeds, 1).await, 3);
    assert_eq!(store.count_records().unwrap(), 2);
}

#[tokio::test]
async fn test_missing_robots_txt_allows_crawl() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/staff", STAFF_TABLE).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let mut config = create_test_config(vec![format!("{}/staff", mock_server.uri())], &db_path);
    config.crawler.robots_mode = RobotsMode::Strict;
    let store = open_db(&db_path);

    let engine = CrawlEngine::new(&config, store.clone()).expect("Failed to create engine");
    assert_eq!(engine.crawl_seeds(&config.seeds, 0).await, 1);
    assert_eq!(store.count_records().unwrap(), 2);
}

#[tokio::test]
async fn test_scheduler_tick_crawls_due_seeds_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STAFF_TABLE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("records.db");
    let seed = format!("{}/staff", mock_server.uri());
    let mut config = create_test_config(vec![seed.clone()], &db_path);
    config.crawler.max_depth = 0;
    let store = open_db(&db_path);
    let scheduler = CrawlScheduler::new(config, store.clone());

    assert_eq!(scheduler.due_seeds(chrono::Utc::now()), vec![seed.clone()]);
    assert_eq!(scheduler.run_tick().await.unwrap(), 1);

    // Crawled moments ago, so not due again within the 24h interval
    assert!(scheduler.due_seeds(chrono::Utc::now()).is_empty());
    assert_eq!(scheduler.run_tick().await.unwrap(), 0);
    assert_eq!(
        scheduler.interval(),
        Duration::from_secs(24 * 3600),
        "Default interval should be one day"
    );
}

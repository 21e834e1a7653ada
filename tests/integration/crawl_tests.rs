//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use crawl_dispatch::config::{parse_config, Config};
use crawl_dispatch::crawler::{crawl, CrawlOptions};
use crawl_dispatch::entity::ResultStatus;
use crawl_dispatch::output::load_statistics;
use crawl_dispatch::storage::{open_storage, AccessResultStore};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seed` into `db_path`
fn create_test_config(seed: &str, db_path: &Path, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[crawler]
session-id = "test"
thread-count = 3
max-depth = 2
max-thread-check-count = 5
wait-new-url = 10
seeds = ["{seed}"]

[client]
max-retry-count = 2
retry-interval = 10
access-timeout = 5000

{extra}

[output]
database-path = "{db}"
"#,
        seed = seed,
        extra = extra,
        db = db_path.display()
    ))
    .expect("Invalid test config")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{0}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="mailto:admin@example.com">Mail</a>
            </body></html>"#,
            base_url
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(
            r#"<html><body><a href="/">Home</a><a href="/page2">Page 2</a></body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<html><body>Content 2</body></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&format!("{}/", base_url), &db_path, "");

    let summary = crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");
    assert_eq!(summary.processed, 3);

    let storage = open_storage(&db_path).expect("Failed to open DB");
    let stats = load_statistics(&storage, &storage, "test").expect("Failed to load stats");
    assert_eq!(stats.results, 3);
    assert_eq!(stats.count(ResultStatus::Ok), 3);
    assert_eq!(stats.queued, 0);

    let results = storage.select_results("test", 0, 10).expect("Failed to select");
    let page1 = results
        .iter()
        .find(|r| r.url.ends_with("/page1"))
        .expect("page1 not crawled");
    assert_eq!(page1.parent_url.as_deref(), Some(format!("{}/", base_url).as_str()));
    assert_eq!(page1.mime_type.as_deref(), Some("text/html"));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<html><body>Moved here</body></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&format!("{}/old", base_url), &db_path, "");

    crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");

    let storage = open_storage(&db_path).expect("Failed to open DB");
    let results = storage.select_results("test", 0, 10).expect("Failed to select");
    assert_eq!(results.len(), 2);

    let old = results.iter().find(|r| r.url.ends_with("/old")).unwrap();
    assert_eq!(old.http_status_code, Some(301));
    let new = results.iter().find(|r| r.url.ends_with("/new")).unwrap();
    assert_eq!(new.parent_url.as_deref(), Some(format!("{}/old", base_url).as_str()));
}

#[tokio::test]
async fn test_error_status_and_oversized_pages_are_failed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/broken">B</a><a href="/huge">H</a></body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    // Rejected on the first attempt, never retried
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(html(format!(
            "<html><body>{}</body></html>",
            "x".repeat(4096)
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(
        &format!("{}/", base_url),
        &db_path,
        "[content-length]\ndefault = 1024",
    );

    crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");

    let storage = open_storage(&db_path).expect("Failed to open DB");
    let results = storage.select_results("test", 0, 10).expect("Failed to select");
    assert_eq!(results.len(), 3);

    let broken = results.iter().find(|r| r.url.ends_with("/broken")).unwrap();
    assert_eq!(broken.status, ResultStatus::Failed);
    assert_eq!(broken.http_status_code, Some(500));

    let huge = results.iter().find(|r| r.url.ends_with("/huge")).unwrap();
    assert_eq!(huge.status, ResultStatus::Failed);
    assert!(huge
        .error_message
        .as_deref()
        .unwrap()
        .contains("is over 1024 byte"));
}

#[tokio::test]
async fn test_unreachable_seed_lists_every_attempt() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&format!("http://127.0.0.1:{}/", port), &db_path, "");

    let summary = crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");
    assert_eq!(summary.processed, 1);

    let storage = open_storage(&db_path).expect("Failed to open DB");
    let results = storage.select_results("test", 0, 10).expect("Failed to select");
    let message = results[0].error_message.as_deref().unwrap();
    assert!(message.contains("after 2 attempts"));
    assert!(message.contains("Cause #1"));
    assert!(message.contains("Cause #2"));
}

#[tokio::test]
async fn test_resume_continues_pending_urls() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#.to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(html("<html><body>leaf</body></html>".to_string()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("crawl.db");

    // First run stops after the seed; its children are saved to the store
    let mut config = create_test_config(&format!("{}/", base_url), &db_path, "");
    config.crawler.thread_count = 1;
    config.crawler.max_access_count = 1;
    let first = crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");
    assert_eq!(first.processed, 1);

    config.crawler.max_access_count = 0;
    let second = crawl(&config, &CrawlOptions::default())
        .await
        .expect("Crawl failed");
    assert_eq!(second.processed, 2);

    let storage = open_storage(&db_path).expect("Failed to open DB");
    assert_eq!(storage.count_session_results("test").unwrap(), 3);
}

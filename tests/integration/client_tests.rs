//! Integration tests for the dispatch layer against real clients

use crawl_dispatch::client::{
    ClientRouter, ContentLengthGuard, FaultTolerantClient, FetchOutcome, Fetcher,
    FileSystemFetcher, HttpFetcher, RequestListener,
};
use crawl_dispatch::entity::RequestData;
use crawl_dispatch::CrawlError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct CountingListener {
    requests: AtomicUsize,
    exceptions: AtomicUsize,
    ends: AtomicUsize,
}

impl RequestListener for CountingListener {
    fn on_request(&self, _client: &FaultTolerantClient, _request: &RequestData, _attempt: u32) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exception(
        &self,
        _client: &FaultTolerantClient,
        _request: &RequestData,
        _attempt: u32,
        _cause: &CrawlError,
    ) {
        self.exceptions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_request_end(
        &self,
        _client: &FaultTolerantClient,
        _request: &RequestData,
        _causes: &[CrawlError],
    ) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

fn create_test_router() -> ClientRouter {
    let http: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new().expect("Failed to build client"));
    let file: Arc<dyn Fetcher> = Arc::new(FileSystemFetcher::new());

    let mut router = ClientRouter::new();
    router.add_client("http:.*", Arc::clone(&http)).unwrap();
    router.add_client("https:.*", http).unwrap();
    router.add_client("file:.*", file).unwrap();
    router
}

#[tokio::test]
async fn test_router_dispatches_by_scheme() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("hello", "text/plain"),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "file body").unwrap();

    let router = create_test_router();

    let http_url = format!("{}/hello", mock_server.uri());
    let client = router.get_client(http_url.as_str()).expect("No http client");
    let mut response = client
        .execute(&RequestData::get(http_url.as_str()).unwrap())
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.mime_type.as_deref(), Some("text/plain"));
    assert_eq!(response.take_body().unwrap().into_bytes().unwrap(), b"hello");

    let file_url = url::Url::from_file_path(dir.path().join("a.txt"))
        .unwrap()
        .to_string();
    let client = router.get_client(file_url.as_str()).expect("No file client");
    let mut response = client
        .execute(&RequestData::get(file_url.as_str()).unwrap())
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(response.take_body().unwrap().into_bytes().unwrap(), b"file body");

    assert!(router.get_client("smb://server/share").is_none());
    assert!(router.get_client(" ").is_none());
}

#[tokio::test]
async fn test_retry_until_connection_succeeds_is_aggregated() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let counter = Arc::new(CountingListener::default());
    let client = FaultTolerantClient::new(Arc::new(HttpFetcher::new().unwrap()))
        .with_max_retry_count(3)
        .with_retry_interval(Duration::from_millis(5))
        .with_listener(counter.clone());

    let request = RequestData::get(format!("http://127.0.0.1:{}/", port)).unwrap();
    let err = client.execute(&request).await.unwrap_err();

    assert!(matches!(err, CrawlError::MultipleAccess { .. }));
    assert_eq!(err.causes().len(), 3);
    assert!(err.causes().iter().all(CrawlError::is_retryable));
    assert_eq!(counter.requests.load(Ordering::SeqCst), 3);
    assert_eq!(counter.exceptions.load(Ordering::SeqCst), 3);
    assert_eq!(counter.ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_server_hits_access_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2000)))
        .mount(&mock_server)
        .await;

    let client = FaultTolerantClient::new(Arc::new(HttpFetcher::new().unwrap()))
        .with_max_retry_count(2)
        .with_access_timeout(Some(Duration::from_millis(50)));

    let request = RequestData::get(format!("{}/slow", mock_server.uri())).unwrap();
    let err = client.execute(&request).await.unwrap_err();

    assert_eq!(err.causes().len(), 2);
    assert!(err.causes().iter().all(CrawlError::is_interrupted));
}

#[tokio::test]
async fn test_oversized_response_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("x".repeat(100), "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut guard = ContentLengthGuard::default();
    guard.add_max_length("text/html", 99);
    let guard = Arc::new(guard);

    let counter = Arc::new(CountingListener::default());
    let client = FaultTolerantClient::new(Arc::new(HttpFetcher::new().unwrap()))
        .with_content_length_guard(guard)
        .with_listener(counter.clone());

    let request = RequestData::get(format!("{}/big", mock_server.uri())).unwrap();
    let err = client.execute(&request).await.unwrap_err();

    assert!(matches!(
        err,
        CrawlError::MaxLengthExceeded {
            length: 100,
            max_length: 99,
            ..
        }
    ));
    assert_eq!(counter.requests.load(Ordering::SeqCst), 1);
    assert_eq!(counter.ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_file_directory_expands() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("one.txt"), "1").unwrap();
    std::fs::write(dir.path().join("two.txt"), "2").unwrap();

    let router = create_test_router();
    let url = url::Url::from_directory_path(dir.path()).unwrap().to_string();
    let client = router.get_client(url.as_str()).unwrap();

    match client.execute(&RequestData::get(url.as_str()).unwrap()).await.unwrap() {
        FetchOutcome::Expand(children) => assert_eq!(children.len(), 2),
        FetchOutcome::Success(_) => panic!("expected child urls"),
    }
}

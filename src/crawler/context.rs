//! Shared dependencies of the crawl workers

use crate::client::{
    ClientRouter, ContentLengthGuard, FaultTolerantClient, FileSystemFetcher, Fetcher,
    HttpFetcher, RequestListener,
};
use crate::config::{ClientConfig, ClientKind, Config, ContentLengthConfig};
use crate::crawler::UrlFilter;
use crate::entity::RequestData;
use crate::extractor::ExtractorRegistry;
use crate::frontier::CrawlSession;
use crate::storage::AccessResultStore;
use crate::{CrawlError, CrawlResult};
use std::sync::Arc;

/// Everything a worker needs to process an entry
///
/// Built once per crawl and shared by every worker through an `Arc`.
pub struct CrawlerContext {
    pub router: Arc<ClientRouter>,
    pub content_length_guard: Arc<ContentLengthGuard>,
    pub extractors: Arc<ExtractorRegistry>,
    pub result_store: Arc<dyn AccessResultStore>,
    pub session: Arc<CrawlSession>,
    /// Polled entries and discovered children outside the filter are dropped
    pub url_filter: Arc<UrlFilter>,
    /// Entries deeper than this are skipped; unlimited when `None`
    pub max_depth: Option<u32>,
}

impl CrawlerContext {
    /// Builds the router and guards described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `session` - The frontier of the session to crawl
    /// * `result_store` - Where access results are recorded
    pub fn from_config(
        config: &Config,
        session: Arc<CrawlSession>,
        result_store: Arc<dyn AccessResultStore>,
    ) -> CrawlResult<Self> {
        let content_length_guard = Arc::new(build_content_length_guard(&config.content_length));
        let router = build_router(&config.client, Arc::clone(&content_length_guard))?;
        let url_filter = UrlFilter::new(
            config.crawler.include.as_slice(),
            config.crawler.exclude.as_slice(),
        )?;

        Ok(Self {
            router: Arc::new(router),
            content_length_guard,
            extractors: Arc::new(ExtractorRegistry::with_defaults()),
            result_store,
            session,
            url_filter: Arc::new(url_filter),
            max_depth: config.crawler.max_depth,
        })
    }
}

/// Builds the per-mime content length policy
pub fn build_content_length_guard(config: &ContentLengthConfig) -> ContentLengthGuard {
    let mut guard = ContentLengthGuard::new(config.default);
    for (mime_type, max_length) in &config.mime_types {
        guard.add_max_length(mime_type, *max_length);
    }
    guard
}

/// Builds the client router from the configured rules
///
/// Every protocol client is wrapped in a [`FaultTolerantClient`] carrying the
/// retry policy, access timeout and content length guard. Rules naming the
/// same client kind share one instance.
pub fn build_router(
    config: &ClientConfig,
    guard: Arc<ContentLengthGuard>,
) -> CrawlResult<ClientRouter> {
    let mut http: Option<Arc<dyn Fetcher>> = None;
    let mut file: Option<Arc<dyn Fetcher>> = None;
    let mut router = ClientRouter::new();

    for rule in &config.rules {
        let slot = match rule.client {
            ClientKind::Http => &mut http,
            ClientKind::File => &mut file,
        };

        if slot.is_none() {
            let client = create_client(rule.client, config, Arc::clone(&guard))?;
            *slot = Some(wrap(client, config, &guard));
        }

        if let Some(client) = slot {
            router.add_client(&rule.pattern, Arc::clone(client))?;
            tracing::debug!("Routing '{}' to the {:?} client", rule.pattern, rule.client);
        }
    }

    Ok(router)
}

fn create_client(
    kind: ClientKind,
    config: &ClientConfig,
    guard: Arc<ContentLengthGuard>,
) -> CrawlResult<Arc<dyn Fetcher>> {
    let client: Arc<dyn Fetcher> = match kind {
        ClientKind::Http => Arc::new(
            HttpFetcher::with_user_agent(&config.user_agent)?
                .with_spool_threshold(config.spool_threshold)
                .with_content_length_guard(guard),
        ),
        ClientKind::File => Arc::new(
            FileSystemFetcher::new()
                .with_spool_threshold(config.spool_threshold)
                .with_content_length_guard(guard),
        ),
    };
    Ok(client)
}

fn wrap(
    client: Arc<dyn Fetcher>,
    config: &ClientConfig,
    guard: &Arc<ContentLengthGuard>,
) -> Arc<dyn Fetcher> {
    Arc::new(
        FaultTolerantClient::new(client)
            .with_max_retry_count(config.max_retry_count)
            .with_retry_interval(config.retry_interval())
            .with_access_timeout(config.access_timeout())
            .with_content_length_guard(Arc::clone(guard))
            .with_listener(Arc::new(LoggingRequestListener)),
    )
}

/// Traces every request through the retry loop
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRequestListener;

impl RequestListener for LoggingRequestListener {
    fn on_request(&self, _client: &FaultTolerantClient, request: &RequestData, attempt: u32) {
        tracing::debug!("Attempt {} for {}", attempt, request.url());
    }

    fn on_exception(
        &self,
        _client: &FaultTolerantClient,
        request: &RequestData,
        attempt: u32,
        error: &CrawlError,
    ) {
        tracing::debug!("Attempt {} for {} failed: {}", attempt, request.url(), error);
    }

    fn on_request_end(
        &self,
        _client: &FaultTolerantClient,
        request: &RequestData,
        causes: &[CrawlError],
    ) {
        if !causes.is_empty() {
            tracing::debug!("{} finished after {} failed attempts", request.url(), causes.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientRule;

    fn create_test_client_config() -> ClientConfig {
        ClientConfig {
            rules: vec![
                ClientRule {
                    pattern: "http:".to_string(),
                    client: ClientKind::Http,
                },
                ClientRule {
                    pattern: "https:".to_string(),
                    client: ClientKind::Http,
                },
                ClientRule {
                    pattern: "file:".to_string(),
                    client: ClientKind::File,
                },
            ],
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_build_router_shares_clients_per_kind() {
        let router = build_router(
            &create_test_client_config(),
            Arc::new(ContentLengthGuard::default()),
        )
        .unwrap();

        assert_eq!(router.len(), 3);
        let http = router.get_client("http://example.com/").unwrap();
        let https = router.get_client("https://example.com/").unwrap();
        let file = router.get_client("file:///tmp/a.txt").unwrap();

        assert!(Arc::ptr_eq(&http, &https));
        assert!(!Arc::ptr_eq(&http, &file));
        assert!(router.get_client("ftp://example.com/").is_none());
    }

    #[test]
    fn test_build_router_rejects_bad_pattern() {
        let mut config = create_test_client_config();
        config.rules[0].pattern = "(".to_string();

        let result = build_router(&config, Arc::new(ContentLengthGuard::default()));
        assert!(matches!(result, Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_build_content_length_guard() {
        let mut config = ContentLengthConfig::default();
        config.mime_types.insert("text/html".to_string(), 100);

        let guard = build_content_length_guard(&config);
        assert_eq!(guard.max_length(Some("text/html")), 100);
        assert_eq!(guard.max_length(Some("image/png")), 10 * 1024 * 1024);
    }
}

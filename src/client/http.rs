//! HTTP client
//!
//! This module handles HTTP requests for the crawler, including:
//! - Building the reqwest client with the configured user agent
//! - GET and HEAD requests
//! - Streaming bodies to memory or a temporary file, stopping at the
//!   content length limit
//! - Mapping status, Content-Type, Content-Length and Last-Modified onto a
//!   [`ResponseData`]
//! - Reporting redirects instead of following them
//! - Classifying transport failures as access errors

use crate::client::{
    str_param, u64_param, ContentLengthGuard, FetchOutcome, Fetcher, InitParameterMap,
};
use crate::entity::{BodySpooler, Method, RequestData, ResponseData};
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("crawl-dispatch/", env!("CARGO_PKG_VERSION"));

/// Bodies larger than this are spooled to a temporary file
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1024 * 1024;

/// Builds an HTTP client
///
/// # Arguments
///
/// * `user_agent` - Value of the User-Agent header
/// * `timeout` - Overall request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use crawl_dispatch::client::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("TestCrawler/1.0", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Redirects are queued as child URLs
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher for `http` and `https` URLs
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    request_timeout: Duration,
    spool_threshold: usize,
    content_length_guard: Option<Arc<ContentLengthGuard>>,
}

impl HttpFetcher {
    /// Creates a fetcher with the default user agent and a 30 second timeout
    pub fn new() -> CrawlResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> CrawlResult<Self> {
        let request_timeout = Duration::from_secs(30);
        Ok(Self {
            client: build(user_agent, request_timeout)?,
            user_agent: user_agent.to_string(),
            request_timeout,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            content_length_guard: None,
        })
    }

    /// Rejects responses whose declared length is over the limit before the
    /// body is read
    pub fn with_content_length_guard(mut self, guard: Arc<ContentLengthGuard>) -> Self {
        self.content_length_guard = Some(guard);
        self
    }

    pub fn with_spool_threshold(mut self, spool_threshold: usize) -> Self {
        self.spool_threshold = spool_threshold;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn rebuild(&mut self) -> CrawlResult<()> {
        self.client = build(&self.user_agent, self.request_timeout)?;
        Ok(())
    }
}

fn build(user_agent: &str, timeout: Duration) -> CrawlResult<Client> {
    build_http_client(user_agent, timeout)
        .map_err(|e| CrawlError::System(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn execute(&self, request: &RequestData) -> CrawlResult<FetchOutcome> {
        let url = request.url();
        let started = Instant::now();

        let builder = match request.method() {
            Method::Get => self.client.get(url),
            Method::Head => self.client.head(url),
        };

        let mut response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Request timeout"
            } else if e.is_connect() {
                "Connection refused"
            } else {
                "Request failed"
            };
            CrawlError::access_with_source(url, message, e)
        })?;

        let status = response.status();
        let headers = response.headers();

        let mut data = ResponseData::new(request);
        data.http_status_code = status.as_u16();
        apply_headers(&mut data, headers);

        if status.is_redirection() {
            data.redirect_location = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| resolve_location(url, location));
        }

        if let Some(guard) = &self.content_length_guard {
            guard.check(&data)?;
        }

        if request.method() == Method::Get {
            let max_length = self
                .content_length_guard
                .as_ref()
                .map(|guard| guard.max_length(data.mime_type.as_deref()));
            let mut spooler = BodySpooler::new(self.spool_threshold);

            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| CrawlError::access_with_source(url, "Failed to read body", e))?
            {
                let length = spooler.written() + chunk.len() as u64;
                if let Some(max_length) = max_length.filter(|max_length| length > *max_length) {
                    return Err(CrawlError::MaxLengthExceeded {
                        url: url.to_string(),
                        length,
                        max_length,
                    });
                }
                spooler.write(&chunk)?;
            }

            if data.content_length.is_none() {
                data.content_length = Some(spooler.written());
            }
            data.set_body(spooler.finish()?);
        }

        data.execution_time = Some(started.elapsed());
        tracing::debug!(
            "{} {} -> {} ({:?})",
            request.method(),
            url,
            data.http_status_code,
            data.execution_time
        );

        Ok(FetchOutcome::Success(data))
    }

    /// Accepts `user_agent` (string) and `request_timeout` (milliseconds)
    fn set_init_parameters(&mut self, params: &InitParameterMap) -> CrawlResult<()> {
        let mut changed = false;

        if let Some(user_agent) = str_param(params, "user_agent")? {
            self.user_agent = user_agent.to_string();
            changed = true;
        }
        if let Some(timeout) = u64_param(params, "request_timeout")? {
            self.request_timeout = Duration::from_millis(timeout);
            changed = true;
        }
        if let Some(threshold) = u64_param(params, "spool_threshold")? {
            self.spool_threshold = usize::try_from(threshold).unwrap_or(usize::MAX);
        }

        if changed {
            self.rebuild()?;
        }
        Ok(())
    }
}

/// Copies the headers the crawler cares about onto the response
fn apply_headers(data: &mut ResponseData, headers: &HeaderMap) {
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        let mut parts = content_type.split(';');
        if let Some(mime) = parts.next() {
            data.mime_type = Some(mime.trim().to_ascii_lowercase());
        }
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("charset") {
                    data.charset = value.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    data.content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    data.last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            data.add_metadata(name.as_str(), value);
        }
    }
}

/// Parses an RFC 1123 date such as `Wed, 21 Oct 2015 07:28:00 GMT`
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolves a Location header against the request URL
fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(location.trim()).ok().map(|url| url.to_string())
}

//! Fetch clients and the dispatch layer around them
//!
//! This module contains:
//! - The [`Fetcher`] trait implemented by every protocol client
//! - URL-to-client routing ([`ClientRouter`])
//! - Bounded retry with listener hooks ([`FaultTolerantClient`])
//! - Per-attempt deadlines ([`AccessTimeoutGuard`])
//! - Per-mime size limits ([`ContentLengthGuard`])
//! - The bundled HTTP and file system clients

mod content_length;
mod fault_tolerant;
mod fs;
mod http;
mod router;
mod timeout;

pub use content_length::{ContentLengthGuard, DEFAULT_MAX_CONTENT_LENGTH};
pub use fault_tolerant::{
    FaultTolerantClient, RequestListener, RetryOutcome, DEFAULT_MAX_RETRY_COUNT,
};
pub use fs::FileSystemFetcher;
pub use http::{build_http_client, HttpFetcher, DEFAULT_SPOOL_THRESHOLD, DEFAULT_USER_AGENT};
pub use router::ClientRouter;
pub use timeout::AccessTimeoutGuard;

use crate::entity::{ChildUrls, RequestData, ResponseData};
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration values injected into a client before it is shared
pub type InitParameterMap = HashMap<String, serde_json::Value>;

/// Successful outcome of a fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// The resource was fetched
    Success(ResponseData),
    /// The resource is a container; its children should be queued instead
    Expand(ChildUrls),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_response(self) -> Option<ResponseData> {
        match self {
            Self::Success(response) => Some(response),
            Self::Expand(_) => None,
        }
    }
}

/// A protocol client able to execute one request
///
/// Access problems are reported as [`CrawlError::Access`], which the
/// fault-tolerant client retries. Other errors are propagated unchanged.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn execute(&self, request: &RequestData) -> CrawlResult<FetchOutcome>;

    /// Applies configuration values; unknown keys are ignored
    fn set_init_parameters(&mut self, params: &InitParameterMap) -> CrawlResult<()> {
        let _ = params;
        Ok(())
    }

    fn set_access_timeout(&mut self, timeout: Option<Duration>) {
        let _ = timeout;
    }
}

/// Reads an unsigned integer init parameter
pub(crate) fn u64_param(params: &InitParameterMap, key: &str) -> CrawlResult<Option<u64>> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            CrawlError::System(format!(
                "Init parameter '{}' must be a non-negative integer, got {}",
                key, value
            ))
        }),
    }
}

/// Reads a string init parameter
pub(crate) fn str_param<'a>(params: &'a InitParameterMap, key: &str) -> CrawlResult<Option<&'a str>> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| {
            CrawlError::System(format!(
                "Init parameter '{}' must be a string, got {}",
                key, value
            ))
        }),
    }
}

//! Access-timeout guard
//!
//! Puts a deadline on one fetch attempt using `tokio::time::timeout`.

use crate::{AccessInterrupted, CrawlError, CrawlResult};
use std::future::Future;
use std::time::Duration;

/// Bounds a single fetch attempt with a deadline
///
/// When the deadline passes, the in-flight future is dropped and an access
/// error wrapping [`AccessInterrupted`] is returned. Because the guard wraps
/// one attempt rather than the whole retry loop, an interrupted attempt is
/// retried like any other access failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTimeoutGuard {
    timeout: Option<Duration>,
}

impl AccessTimeoutGuard {
    /// Creates a guard; `None` disables it
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn disabled() -> Self {
        Self { timeout: None }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `fut` under the configured deadline
    pub async fn run<T, F>(&self, url: &str, fut: F) -> CrawlResult<T>
    where
        F: Future<Output = CrawlResult<T>>,
    {
        let Some(timeout) = self.timeout else {
            return fut.await;
        };

        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("Access to {} interrupted after {:?}", url, timeout);
                Err(CrawlError::access_with_source(
                    url,
                    "access timeout",
                    AccessInterrupted { timeout },
                ))
            }
        }
    }
}

//! Bounded retry around a single client
//!
//! [`FaultTolerantClient`] decorates another [`Fetcher`]:
//! - each attempt runs under the [`AccessTimeoutGuard`]
//! - successful responses are checked against the [`ContentLengthGuard`]
//! - access failures are retried up to `max_retry_count` attempts, sleeping
//!   `retry_interval` between them
//! - when every attempt fails, the causes are aggregated into
//!   [`CrawlError::MultipleAccess`] in attempt order
//!
//! Any other error, and an [`FetchOutcome::Expand`] outcome, is returned on
//! first occurrence.

use crate::client::{
    u64_param, AccessTimeoutGuard, ContentLengthGuard, FetchOutcome, Fetcher, InitParameterMap,
};
use crate::entity::RequestData;
use crate::{CrawlError, CrawlResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 5;

/// Observer of the retry lifecycle
///
/// Every hook has an empty default. `on_request_end` is called exactly once
/// per `execute`, whatever the outcome.
pub trait RequestListener: Send + Sync {
    fn on_request_start(&self, client: &FaultTolerantClient, request: &RequestData) {
        let _ = (client, request);
    }

    /// Called before each attempt; `attempt` starts at 1
    fn on_request(&self, client: &FaultTolerantClient, request: &RequestData, attempt: u32) {
        let _ = (client, request, attempt);
    }

    fn on_exception(
        &self,
        client: &FaultTolerantClient,
        request: &RequestData,
        attempt: u32,
        cause: &CrawlError,
    ) {
        let _ = (client, request, attempt, cause);
    }

    fn on_request_end(&self, client: &FaultTolerantClient, request: &RequestData, causes: &[CrawlError]) {
        let _ = (client, request, causes);
    }
}

/// What happened during one `execute`
#[derive(Debug)]
pub struct RetryOutcome {
    pub attempts_made: u32,
    /// Access failures in attempt order
    pub causes: Vec<CrawlError>,
    /// `None` when every attempt failed
    pub result: Option<FetchOutcome>,
}

/// Retrying decorator around another client
pub struct FaultTolerantClient {
    client: Arc<dyn Fetcher>,
    max_retry_count: u32,
    retry_interval: Duration,
    listener: Option<Arc<dyn RequestListener>>,
    content_length_guard: Option<Arc<ContentLengthGuard>>,
    timeout_guard: AccessTimeoutGuard,
}

impl FaultTolerantClient {
    /// Wraps `client` with the default policy: five attempts, no pause
    pub fn new(client: Arc<dyn Fetcher>) -> Self {
        Self {
            client,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retry_interval: Duration::ZERO,
            listener: None,
            content_length_guard: None,
            timeout_guard: AccessTimeoutGuard::disabled(),
        }
    }

    /// Sets the number of attempts; values below 1 mean a single attempt
    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count.max(1);
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_content_length_guard(mut self, guard: Arc<ContentLengthGuard>) -> Self {
        self.content_length_guard = Some(guard);
        self
    }

    pub fn with_access_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_guard = AccessTimeoutGuard::new(timeout);
        self
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn access_timeout(&self) -> Option<Duration> {
        self.timeout_guard.timeout()
    }

    /// Runs the retry loop and reports every attempt
    ///
    /// # Returns
    ///
    /// * `Ok(RetryOutcome)` - A result was produced, or every attempt failed
    ///   with an access error (`result` is `None`)
    /// * `Err(CrawlError)` - A non-retryable error, returned unchanged
    pub async fn execute_with_outcome(&self, request: &RequestData) -> CrawlResult<RetryOutcome> {
        if let Some(listener) = &self.listener {
            listener.on_request_start(self, request);
        }

        let mut causes = Vec::new();
        let attempts = self.run_attempts(request, &mut causes).await;

        if let Some(listener) = &self.listener {
            listener.on_request_end(self, request, &causes);
        }

        let (attempts_made, result) = attempts?;
        Ok(RetryOutcome {
            attempts_made,
            causes,
            result,
        })
    }

    async fn run_attempts(
        &self,
        request: &RequestData,
        causes: &mut Vec<CrawlError>,
    ) -> CrawlResult<(u32, Option<FetchOutcome>)> {
        let mut attempt = 0;

        while attempt < self.max_retry_count {
            attempt += 1;

            if let Some(listener) = &self.listener {
                listener.on_request(self, request, attempt);
            }

            let result = self
                .timeout_guard
                .run(request.url(), self.client.execute(request))
                .await
                .and_then(|outcome| self.check_content_length(outcome));

            match result {
                Ok(outcome) => return Ok((attempt, Some(outcome))),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.max_retry_count,
                        request.url(),
                        e
                    );
                    if let Some(listener) = &self.listener {
                        listener.on_exception(self, request, attempt, &e);
                    }
                    causes.push(e);

                    if attempt < self.max_retry_count && !self.retry_interval.is_zero() {
                        tokio::time::sleep(self.retry_interval).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok((attempt, None))
    }

    fn check_content_length(&self, outcome: FetchOutcome) -> CrawlResult<FetchOutcome> {
        if let (Some(guard), FetchOutcome::Success(response)) = (&self.content_length_guard, &outcome) {
            guard.check(response)?;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Fetcher for FaultTolerantClient {
    async fn execute(&self, request: &RequestData) -> CrawlResult<FetchOutcome> {
        let outcome = self.execute_with_outcome(request).await?;
        match outcome.result {
            Some(result) => Ok(result),
            None => {
                tracing::warn!(
                    "Giving up on {} after {} attempts",
                    request.url(),
                    outcome.attempts_made
                );
                Err(CrawlError::MultipleAccess {
                    url: request.url().to_string(),
                    causes: outcome.causes,
                })
            }
        }
    }

    /// Accepts `max_retry_count` and `retry_interval` (milliseconds)
    fn set_init_parameters(&mut self, params: &InitParameterMap) -> CrawlResult<()> {
        if let Some(count) = u64_param(params, "max_retry_count")? {
            self.max_retry_count = u32::try_from(count).unwrap_or(u32::MAX).max(1);
        }
        if let Some(interval) = u64_param(params, "retry_interval")? {
            self.retry_interval = Duration::from_millis(interval);
        }
        Ok(())
    }

    fn set_access_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout_guard = AccessTimeoutGuard::new(timeout);
    }
}

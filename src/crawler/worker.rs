//! Worker pool draining a crawl session

use crate::config::CrawlerConfig;
use crate::crawler::processor::{process_entry, ProcessStatus};
use crate::crawler::CrawlerContext;
use crate::{CrawlError, CrawlResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Worker pool limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlerSettings {
    pub thread_count: usize,
    /// Stop after this many fetched entries; 0 means unlimited
    pub max_access_count: u64,
    /// Consecutive empty polls, with no worker busy, before a worker stops
    pub max_thread_check_count: u32,
    /// Pause after an empty poll
    pub wait_new_url: Duration,
    /// Pause before a worker processes an entry
    pub delay_before_processing: Duration,
    /// Pause after a worker processed an entry
    pub delay_after_processing: Duration,
}

impl From<&CrawlerConfig> for CrawlerSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            thread_count: config.thread_count as usize,
            max_access_count: config.max_access_count,
            max_thread_check_count: config.max_thread_check_count,
            wait_new_url: Duration::from_millis(config.wait_new_url),
            delay_before_processing: Duration::from_millis(config.delay_before_processing),
            delay_after_processing: Duration::from_millis(config.delay_after_processing),
        }
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Entries whose result was recorded
    pub processed: u64,
    /// Entries skipped before fetching
    pub skipped: u64,
}

#[derive(Default)]
struct WorkerState {
    active: AtomicUsize,
    access_count: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    stopped: AtomicBool,
}

impl WorkerState {
    /// Reserves one unit of the access budget
    fn try_reserve(&self, max_access_count: u64) -> bool {
        self.access_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (max_access_count == 0 || count < max_access_count).then_some(count + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.access_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs `thread_count` workers against one session
pub struct Crawler {
    context: Arc<CrawlerContext>,
    settings: CrawlerSettings,
}

impl Crawler {
    pub fn new(context: Arc<CrawlerContext>, settings: CrawlerSettings) -> Self {
        Self { context, settings }
    }

    /// Drains the session
    ///
    /// Returns when every worker has stopped. A worker stops when the access
    /// budget is spent, or when its polls came back empty
    /// `max_thread_check_count` times in a row while no other worker was busy.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Totals of the run
    /// * `Err(CrawlError)` - A worker hit a storage or system error
    pub async fn run(&self) -> CrawlResult<CrawlSummary> {
        let started = Instant::now();
        let state = Arc::new(WorkerState::default());
        let thread_count = self.settings.thread_count.max(1);

        tracing::info!(
            "Starting {} workers for session {}",
            thread_count,
            self.context.session.id()?
        );

        let mut handles = Vec::with_capacity(thread_count);
        for worker_id in 0..thread_count {
            let context = Arc::clone(&self.context);
            let state = Arc::clone(&state);
            let settings = self.settings;
            handles.push(tokio::spawn(async move {
                run_worker(worker_id, context, state, settings).await
            }));
        }

        let mut first_error = None;
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| CrawlError::System(format!("Worker task failed: {}", e)))
                .and_then(|result| result);
            if let Err(e) = result {
                tracing::error!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = CrawlSummary {
            processed: state.processed.load(Ordering::SeqCst),
            skipped: state.skipped.load(Ordering::SeqCst),
        };
        tracing::info!(
            "Processed {} entries in {:?} ({} skipped)",
            summary.processed,
            started.elapsed(),
            summary.skipped
        );
        Ok(summary)
    }
}

async fn run_worker(
    worker_id: usize,
    context: Arc<CrawlerContext>,
    state: Arc<WorkerState>,
    settings: CrawlerSettings,
) -> CrawlResult<()> {
    tracing::debug!("Worker {} started", worker_id);
    let mut empty_checks = 0;

    while !state.stopped.load(Ordering::SeqCst) {
        if !state.try_reserve(settings.max_access_count) {
            tracing::info!("Reached max access count {}", settings.max_access_count);
            state.stopped.store(true, Ordering::SeqCst);
            break;
        }

        state.active.fetch_add(1, Ordering::SeqCst);
        let polled = context.session.poll();

        let entry = match polled {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                state.release();
                let others_active = state.active.fetch_sub(1, Ordering::SeqCst) > 1;

                empty_checks += 1;
                if !others_active && empty_checks >= settings.max_thread_check_count {
                    break;
                }
                tokio::time::sleep(settings.wait_new_url).await;
                continue;
            }
            Err(e) => {
                state.release();
                state.active.fetch_sub(1, Ordering::SeqCst);
                state.stopped.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        empty_checks = 0;
        pause(settings.delay_before_processing).await;
        let result = process_entry(&context, &entry).await;
        state.active.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(ProcessStatus::Recorded(_)) => {
                state.processed.fetch_add(1, Ordering::SeqCst);
                pause(settings.delay_after_processing).await;
            }
            Ok(ProcessStatus::Skipped) => {
                state.release();
                state.skipped.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                state.stopped.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }
    }

    tracing::debug!("Worker {} stopped", worker_id);
    Ok(())
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

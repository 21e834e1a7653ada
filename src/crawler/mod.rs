//! Crawler module driving a session through the dispatch layer
//!
//! This module contains the crawl driver, including:
//! - Building the client router and guards from configuration
//! - Include/exclude filtering of URLs
//! - Per-entry processing (fetch, child discovery, result recording)
//! - The worker pool and its stop conditions
//! - Session setup: fresh starts, resumption and incremental re-crawls

mod context;
mod filter;
mod processor;
mod worker;

pub use context::{build_content_length_guard, build_router, CrawlerContext, LoggingRequestListener};
pub use filter::UrlFilter;
pub use processor::{process_entry, ProcessStatus};
pub use worker::{CrawlSummary, Crawler, CrawlerSettings};

use crate::config::Config;
use crate::frontier::CrawlSession;
use crate::storage::{open_storage, AccessResultStore, SqliteStorage, UrlQueueStore};
use crate::{CrawlError, CrawlResult};
use std::path::Path;
use std::sync::Arc;

/// How a crawl run treats existing session data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Drop pending entries and results of the session before starting
    pub fresh: bool,
    /// Re-crawl every URL processed by this session, skipping unchanged ones
    pub previous_session: Option<String>,
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the database
/// 2. Prepare the session (fresh start, resume, or incremental re-crawl)
/// 3. Queue the seeds when the session has nothing to resume
/// 4. Run the workers until the session is drained
/// 5. Save entries still held in memory
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `options` - How existing session data is treated
///
/// # Example
///
/// ```no_run
/// use crawl_dispatch::config::load_config;
/// use crawl_dispatch::crawler::{crawl, CrawlOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let summary = crawl(&config, &CrawlOptions::default()).await?;
/// println!("{} urls processed", summary.processed);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: &Config, options: &CrawlOptions) -> CrawlResult<CrawlSummary> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    crawl_with_storage(config, options, storage).await
}

/// Same as [`crawl`], against an already opened store
pub async fn crawl_with_storage(
    config: &Config,
    options: &CrawlOptions,
    storage: Arc<SqliteStorage>,
) -> CrawlResult<CrawlSummary> {
    let session_id = config.crawler.session_id.as_str();
    let session = Arc::new(CrawlSession::with_store(
        session_id,
        config.frontier.into(),
        Arc::clone(&storage),
    ));

    prepare_session(config, options, &session, storage.as_ref())?;

    let context = CrawlerContext::from_config(config, Arc::clone(&session), storage)?;
    let crawler = Crawler::new(Arc::new(context), CrawlerSettings::from(&config.crawler));

    let result = crawler.run().await;
    session.save()?;
    result
}

fn prepare_session<S>(
    config: &Config,
    options: &CrawlOptions,
    session: &CrawlSession,
    storage: &S,
) -> CrawlResult<()>
where
    S: UrlQueueStore + AccessResultStore,
{
    let session_id = config.crawler.session_id.as_str();

    if options.previous_session.as_deref() == Some(session_id) {
        return Err(CrawlError::System(format!(
            "Session {} cannot be re-crawled into itself",
            session_id
        )));
    }

    if options.fresh || options.previous_session.is_some() {
        session.delete()?;
        let deleted = storage.delete_results_by_session(session_id)?;
        tracing::info!("Cleared session {} ({} results removed)", session_id, deleted);
    }

    if let Some(previous) = &options.previous_session {
        session.generate_from_results(previous)?;
        return Ok(());
    }

    let pending = storage.count_session_queue(session_id)?;
    let processed = storage.count_session_results(session_id)?;
    if pending > 0 || processed > 0 {
        tracing::info!(
            "Resuming session {}: {} pending, {} processed",
            session_id,
            pending,
            processed
        );
        return Ok(());
    }

    tracing::info!("Seeding session {} with {} urls", session_id, config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        session.add(seed)?;
    }
    Ok(())
}

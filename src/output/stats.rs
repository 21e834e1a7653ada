//! Statistics of a crawl session
//!
//! This module provides functionality for extracting and displaying
//! session statistics from the storage layer.

use crate::entity::ResultStatus;
use crate::storage::{AccessResultStore, UrlQueueStore};
use crate::CrawlResult;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    pub session_id: String,

    /// Entries waiting in the queue store
    pub queued: u64,

    /// Processed URLs
    pub results: u64,

    /// Count of processed URLs by outcome
    pub by_status: HashMap<ResultStatus, u64>,
}

impl CrawlStatistics {
    pub fn count(&self, status: ResultStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of processed URLs that ended in `status`, in percent
    pub fn percentage(&self, status: ResultStatus) -> f64 {
        if self.results == 0 {
            0.0
        } else {
            (self.count(status) as f64 / self.results as f64) * 100.0
        }
    }
}

/// Loads statistics of one session
///
/// # Arguments
///
/// * `queue_store` - The store holding pending entries
/// * `result_store` - The store holding access results
/// * `session_id` - The session to report on
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query the stores
pub fn load_statistics(
    queue_store: &dyn UrlQueueStore,
    result_store: &dyn AccessResultStore,
    session_id: &str,
) -> CrawlResult<CrawlStatistics> {
    let queued = queue_store.count_session_queue(session_id)?;
    let results = result_store.count_session_results(session_id)?;
    let by_status = result_store.status_summary(session_id)?;

    Ok(CrawlStatistics {
        session_id: session_id.to_string(),
        queued,
        results,
        by_status,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Session: {}", stats.session_id);
    println!("  Pending urls: {}", stats.queued);
    println!("  Processed urls: {}", stats.results);
    println!();

    println!("Results by Status:");
    let mut status_counts: Vec<_> = ResultStatus::all()
        .into_iter()
        .map(|status| (status, stats.count(status)))
        .filter(|(_, count)| *count > 0)
        .collect();
    status_counts.sort_by(|a, b| b.1.cmp(&a.1));

    for (status, count) in status_counts {
        println!(
            "  {}: {} ({:.1}%)",
            status.to_db_string(),
            count,
            stats.percentage(status)
        );
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} urls fetched)",
        stats.percentage(ResultStatus::Ok),
        stats.count(ResultStatus::Ok),
        stats.results
    );
}

//! Storage traits and error types
//!
//! This module defines the trait interfaces for the queue and result stores
//! and the associated error types.

use crate::entity::{AccessResult, FrontierEntry, ResultStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage lock poisoned")]
    Lock,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent part of the crawl frontier
///
/// Implementations must be safe to share between workers.
pub trait UrlQueueStore: Send + Sync {
    // ===== Insertion =====

    /// Inserts one entry and returns its row id
    fn insert_entry(&self, entry: &FrontierEntry) -> StorageResult<i64>;

    /// Inserts many entries at once
    ///
    /// # Returns
    ///
    /// The number of rows inserted
    fn batch_insert_entries(&self, entries: &[FrontierEntry]) -> StorageResult<usize>;

    // ===== Retrieval =====

    /// Returns up to `page_size` of the session's oldest entries without
    /// removing them
    fn select_entries(&self, session_id: &str, page_size: usize) -> StorageResult<Vec<FrontierEntry>>;

    /// Removes the entries with the given row ids
    fn delete_entries(&self, ids: &[i64]) -> StorageResult<usize>;

    /// Removes and returns up to `page_size` of the session's oldest entries
    ///
    /// The default selects then deletes, so entries may be returned twice if
    /// the process stops in between. Implementations that can claim a page
    /// atomically should override it.
    fn claim_entries(&self, session_id: &str, page_size: usize) -> StorageResult<Vec<FrontierEntry>> {
        let entries = self.select_entries(session_id, page_size)?;
        let ids: Vec<i64> = entries.iter().filter_map(|entry| entry.id).collect();
        self.delete_entries(&ids)?;
        Ok(entries)
    }

    // ===== Lookup =====

    /// Counts queued rows with this URL in the session
    fn count_queued(&self, url: &str, session_id: &str) -> StorageResult<u64>;

    /// Counts all queued rows of the session
    fn count_session_queue(&self, session_id: &str) -> StorageResult<u64>;

    // ===== Session Management =====

    /// Removes every queued row of the session
    fn delete_queue_by_session(&self, session_id: &str) -> StorageResult<usize>;

    /// Moves queued rows from one session id to another
    fn rename_queue_session(&self, old_session_id: &str, new_session_id: &str) -> StorageResult<usize>;
}

/// Records of URLs that have been processed
pub trait AccessResultStore: Send + Sync {
    /// Inserts a result and returns its row id
    fn insert_result(&self, result: &AccessResult) -> StorageResult<i64>;

    /// Counts results with this URL in the session
    fn count_results(&self, url: &str, session_id: &str) -> StorageResult<u64>;

    /// Counts all results of the session
    fn count_session_results(&self, session_id: &str) -> StorageResult<u64>;

    /// Returns results of the session ordered by id
    fn select_results(&self, session_id: &str, offset: usize, limit: usize) -> StorageResult<Vec<AccessResult>>;

    /// Removes every result of the session
    fn delete_results_by_session(&self, session_id: &str) -> StorageResult<usize>;

    /// Counts the session's results per status
    fn status_summary(&self, session_id: &str) -> StorageResult<HashMap<ResultStatus, u64>>;
}

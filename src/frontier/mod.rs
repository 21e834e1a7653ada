//! Per-session crawl frontier
//!
//! A [`CrawlSession`] owns the pending URLs of one crawl session:
//! - a bounded in-memory queue, overflowing into the [`UrlQueueStore`]
//! - a [`VisitedCache`] of accepted URLs for fast rejection
//! - handles to the queue and result stores used as the authoritative
//!   de-duplication checks
//!
//! Workers share a session through an `Arc`; every read-modify-write runs
//! under the session's mutex.

mod visited;

pub use visited::VisitedCache;

use crate::entity::FrontierEntry;
use crate::storage::{AccessResultStore, UrlQueueStore};
use crate::{CrawlError, CrawlResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Sizing of a session's in-memory structures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierConfig {
    /// Entries loaded from the queue store when memory runs empty
    pub page_size: usize,
    /// Entries kept in memory before new ones go to the queue store
    pub buffer_size: usize,
    pub visited_cache_size: usize,
    /// Results read per page when regenerating a queue from a previous session
    pub generated_page_size: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            buffer_size: 1000,
            visited_cache_size: 1000,
            generated_page_size: 1000,
        }
    }
}

struct SessionState {
    id: String,
    queue: VecDeque<FrontierEntry>,
    visited: VisitedCache,
}

/// Frontier of a single crawl session
pub struct CrawlSession {
    state: Mutex<SessionState>,
    config: FrontierConfig,
    queue_store: Arc<dyn UrlQueueStore>,
    result_store: Arc<dyn AccessResultStore>,
}

impl CrawlSession {
    pub fn new(
        session_id: impl Into<String>,
        config: FrontierConfig,
        queue_store: Arc<dyn UrlQueueStore>,
        result_store: Arc<dyn AccessResultStore>,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                id: session_id.into(),
                queue: VecDeque::new(),
                visited: VisitedCache::new(config.visited_cache_size),
            }),
            config,
            queue_store,
            result_store,
        }
    }

    /// Creates a session whose queue and results live in the same store
    pub fn with_store<S>(session_id: impl Into<String>, config: FrontierConfig, store: Arc<S>) -> Self
    where
        S: UrlQueueStore + AccessResultStore + 'static,
    {
        let queue_store: Arc<dyn UrlQueueStore> = store.clone();
        let result_store: Arc<dyn AccessResultStore> = store;
        Self::new(session_id, config, queue_store, result_store)
    }

    pub fn id(&self) -> CrawlResult<String> {
        Ok(self.lock()?.id.clone())
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    /// Number of entries currently held in memory
    pub fn buffered(&self) -> CrawlResult<usize> {
        Ok(self.lock()?.queue.len())
    }

    /// Queues every candidate that was not seen before in this session
    ///
    /// A candidate is rejected when its URL is blank, is in the visited
    /// cache, is in the in-memory queue, is in the queue store, or is in
    /// the result store, checked in that order. Accepted entries are stamped
    /// with the session id and recorded in the visited cache.
    ///
    /// The batch is all or nothing: if a lookup or the write of the overflow
    /// to the queue store fails, no entry is queued or recorded.
    ///
    /// # Returns
    ///
    /// The number of accepted entries
    pub fn offer_all<I>(&self, candidates: I) -> CrawlResult<usize>
    where
        I: IntoIterator<Item = FrontierEntry>,
    {
        let mut state = self.lock()?;
        let mut accepted: Vec<FrontierEntry> = Vec::new();

        for mut entry in candidates {
            if accepted.iter().any(|queued| queued.url == entry.url)
                || !self.is_new_url(&mut state, &entry.url, true)?
            {
                tracing::debug!("Rejected known URL {}", entry.url);
                continue;
            }

            entry.id = None;
            entry.session_id = state.id.clone();
            accepted.push(entry);
        }

        let room = self.config.buffer_size.saturating_sub(state.queue.len());
        let overflow = accepted.split_off(room.min(accepted.len()));
        if !overflow.is_empty() {
            tracing::debug!("Moving {} entries to the queue store", overflow.len());
            self.queue_store.batch_insert_entries(&overflow)?;
        }

        let count = accepted.len() + overflow.len();
        for entry in overflow.iter().chain(accepted.iter()) {
            state.visited.insert(&entry.url);
        }
        state.queue.extend(accepted);

        Ok(count)
    }

    /// Takes the next pending entry
    ///
    /// When memory is empty, a page of entries is claimed from the queue
    /// store first.
    pub fn poll(&self) -> CrawlResult<Option<FrontierEntry>> {
        let mut state = self.lock()?;

        if state.queue.is_empty() {
            let page = self
                .queue_store
                .claim_entries(&state.id, self.config.page_size)?;
            if !page.is_empty() {
                tracing::debug!("Loaded {} entries for session {}", page.len(), state.id);
            }
            state.queue.extend(page);
        }

        Ok(state.queue.pop_front())
    }

    /// Returns true if `offer_all` would reject the entry
    ///
    /// Does not change the visited cache.
    pub fn visited(&self, entry: &FrontierEntry) -> CrawlResult<bool> {
        let mut state = self.lock()?;
        Ok(!self.is_new_url(&mut state, &entry.url, false)?)
    }

    /// Queues a depth-0 GET entry without de-duplication
    pub fn add(&self, url: &str) -> CrawlResult<()> {
        if url.trim().is_empty() {
            return Err(CrawlError::System("Cannot add a blank url".to_string()));
        }

        let mut state = self.lock()?;
        let entry = FrontierEntry::new(state.id.clone(), url);
        state.visited.insert(url);
        state.queue.push_back(entry);
        Ok(())
    }

    /// Moves every in-memory entry to the queue store
    pub fn save(&self) -> CrawlResult<usize> {
        let mut state = self.lock()?;
        let entries: Vec<FrontierEntry> = state
            .queue
            .drain(..)
            .map(|mut entry| {
                entry.id = None;
                entry
            })
            .collect();

        let saved = self.queue_store.batch_insert_entries(&entries)?;
        tracing::info!("Saved {} pending entries of session {}", saved, state.id);
        Ok(saved)
    }

    /// Drops every pending entry of the session, in memory and in the store
    pub fn delete(&self) -> CrawlResult<()> {
        let mut state = self.lock()?;
        let deleted = self.queue_store.delete_queue_by_session(&state.id)?;
        state.queue.clear();
        state.visited.clear();
        tracing::debug!("Deleted {} stored entries of session {}", deleted, state.id);
        Ok(())
    }

    /// Moves the session, including stored entries, to a new id
    pub fn rename(&self, new_session_id: &str) -> CrawlResult<()> {
        let mut state = self.lock()?;
        self.queue_store
            .rename_queue_session(&state.id, new_session_id)?;

        for entry in state.queue.iter_mut() {
            entry.session_id = new_session_id.to_string();
        }
        state.id = new_session_id.to_string();
        Ok(())
    }

    /// Queues every URL processed by a previous session
    ///
    /// Each entry carries the previous result's last-modified time so the
    /// crawler can skip unchanged content.
    ///
    /// # Returns
    ///
    /// The number of entries queued
    pub fn generate_from_results(&self, previous_session_id: &str) -> CrawlResult<usize> {
        let session_id = self.id()?;
        let page_size = self.config.generated_page_size.max(1);
        let mut offset = 0;
        let mut generated = 0;

        loop {
            let results = self
                .result_store
                .select_results(previous_session_id, offset, page_size)?;
            if results.is_empty() {
                break;
            }

            let entries: Vec<FrontierEntry> = results
                .iter()
                .map(|result| {
                    FrontierEntry::new(session_id.clone(), result.url.clone())
                        .with_method(result.method)
                        .with_last_modified(result.last_modified)
                })
                .collect();
            generated += self.queue_store.batch_insert_entries(&entries)?;

            if results.len() < page_size {
                break;
            }
            offset += results.len();
        }

        tracing::info!(
            "Generated {} entries for session {} from session {}",
            generated,
            session_id,
            previous_session_id
        );
        Ok(generated)
    }

    fn is_new_url(&self, state: &mut SessionState, url: &str, touch: bool) -> CrawlResult<bool> {
        if url.trim().is_empty() {
            return Ok(false);
        }

        let cached = if touch {
            state.visited.touch(url)
        } else {
            state.visited.contains(url)
        };
        if cached {
            return Ok(false);
        }

        if state.queue.iter().any(|entry| entry.url == url) {
            return Ok(false);
        }

        if self.queue_store.count_queued(url, &state.id)? > 0 {
            return Ok(false);
        }

        if self.result_store.count_results(url, &state.id)? > 0 {
            return Ok(false);
        }

        Ok(true)
    }

    fn lock(&self) -> CrawlResult<MutexGuard<'_, SessionState>> {
        self.state
            .lock()
            .map_err(|_| CrawlError::System("Session lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AccessResult, Method, ResultStatus};
    use crate::storage::{SqliteStorage, StorageError, StorageResult};
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn create_test_session(config: FrontierConfig) -> (CrawlSession, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let session = CrawlSession::with_store("s1", config, storage.clone());
        (session, storage)
    }

    fn candidate(url: &str) -> FrontierEntry {
        FrontierEntry::new("", url)
    }

    /// Queue store whose batch inserts fail while `failing` is set
    struct FlakyQueueStore {
        inner: SqliteStorage,
        failing: AtomicBool,
    }

    impl FlakyQueueStore {
        fn new() -> Self {
            Self {
                inner: SqliteStorage::open_in_memory().unwrap(),
                failing: AtomicBool::new(true),
            }
        }
    }

    impl UrlQueueStore for FlakyQueueStore {
        fn insert_entry(&self, entry: &FrontierEntry) -> StorageResult<i64> {
            self.inner.insert_entry(entry)
        }

        fn batch_insert_entries(&self, entries: &[FrontierEntry]) -> StorageResult<usize> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Database("disk full".to_string()));
            }
            self.inner.batch_insert_entries(entries)
        }

        fn select_entries(&self, session_id: &str, page_size: usize) -> StorageResult<Vec<FrontierEntry>> {
            self.inner.select_entries(session_id, page_size)
        }

        fn delete_entries(&self, ids: &[i64]) -> StorageResult<usize> {
            self.inner.delete_entries(ids)
        }

        fn count_queued(&self, url: &str, session_id: &str) -> StorageResult<u64> {
            self.inner.count_queued(url, session_id)
        }

        fn count_session_queue(&self, session_id: &str) -> StorageResult<u64> {
            self.inner.count_session_queue(session_id)
        }

        fn delete_queue_by_session(&self, session_id: &str) -> StorageResult<usize> {
            self.inner.delete_queue_by_session(session_id)
        }

        fn rename_queue_session(&self, old_session_id: &str, new_session_id: &str) -> StorageResult<usize> {
            self.inner.rename_queue_session(old_session_id, new_session_id)
        }
    }

    #[test]
    fn test_offer_then_poll_roundtrip() {
        let (session, _) = create_test_session(FrontierConfig::default());

        assert_eq!(session.offer_all([candidate("http://example.com/")]).unwrap(), 1);

        let entry = session.poll().unwrap().unwrap();
        assert_eq!(entry.url, "http://example.com/");
        assert_eq!(entry.session_id, "s1");

        // Still in the visited cache after being polled
        assert_eq!(session.offer_all([candidate("http://example.com/")]).unwrap(), 0);
        assert!(session.poll().unwrap().is_none());
    }

    #[test]
    fn test_blank_urls_are_rejected() {
        let (session, _) = create_test_session(FrontierConfig::default());
        assert_eq!(session.offer_all([candidate(""), candidate("  ")]).unwrap(), 0);
        assert!(session.add(" ").is_err());
    }

    #[test]
    fn test_duplicates_in_one_batch() {
        let (session, _) = create_test_session(FrontierConfig::default());
        let accepted = session
            .offer_all([
                candidate("http://example.com/a"),
                candidate("http://example.com/a"),
                candidate("http://example.com/b"),
            ])
            .unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(session.buffered().unwrap(), 2);
    }

    #[test]
    fn test_in_memory_queue_is_checked_after_eviction() {
        let config = FrontierConfig {
            visited_cache_size: 1,
            ..FrontierConfig::default()
        };
        let (session, _) = create_test_session(config);

        session.offer_all([candidate("http://example.com/a")]).unwrap();
        session.offer_all([candidate("http://example.com/b")]).unwrap();

        // "a" was evicted from the cache but is still queued in memory
        assert_eq!(session.offer_all([candidate("http://example.com/a")]).unwrap(), 0);
    }

    #[test]
    fn test_queue_store_is_checked() {
        let (session, storage) = create_test_session(FrontierConfig::default());
        storage
            .insert_entry(&FrontierEntry::new("s1", "http://example.com/stored"))
            .unwrap();

        assert!(session.visited(&candidate("http://example.com/stored")).unwrap());
        assert_eq!(
            session.offer_all([candidate("http://example.com/stored")]).unwrap(),
            0
        );
    }

    #[test]
    fn test_result_store_is_checked() {
        let (session, storage) = create_test_session(FrontierConfig::default());
        storage
            .insert_result(&AccessResult::new("s1", "http://example.com/done", ResultStatus::Ok))
            .unwrap();
        storage
            .insert_result(&AccessResult::new("s2", "http://example.com/other", ResultStatus::Ok))
            .unwrap();

        assert_eq!(session.offer_all([candidate("http://example.com/done")]).unwrap(), 0);
        assert_eq!(session.offer_all([candidate("http://example.com/other")]).unwrap(), 1);
    }

    #[test]
    fn test_visited_does_not_record() {
        let (session, _) = create_test_session(FrontierConfig::default());
        let entry = candidate("http://example.com/");

        assert!(!session.visited(&entry).unwrap());
        assert!(!session.visited(&entry).unwrap());

        session.offer_all([entry.clone()]).unwrap();
        assert!(session.visited(&entry).unwrap());
    }

    #[test]
    fn test_overflow_goes_to_store_and_is_polled_back() {
        let config = FrontierConfig {
            buffer_size: 2,
            page_size: 2,
            ..FrontierConfig::default()
        };
        let (session, storage) = create_test_session(config);

        let urls: Vec<String> = (0..5).map(|i| format!("http://example.com/{}", i)).collect();
        let accepted = session
            .offer_all(urls.iter().map(|url| candidate(url)))
            .unwrap();
        assert_eq!(accepted, 5);
        assert_eq!(session.buffered().unwrap(), 2);
        assert_eq!(storage.count_session_queue("s1").unwrap(), 3);

        let mut polled = Vec::new();
        while let Some(entry) = session.poll().unwrap() {
            polled.push(entry.url);
        }
        assert_eq!(polled, urls);
        assert_eq!(storage.count_session_queue("s1").unwrap(), 0);
    }

    #[test]
    fn test_save_flushes_memory_to_store() {
        let (session, storage) = create_test_session(FrontierConfig::default());
        session.add("http://example.com/").unwrap();
        session.offer_all([candidate("http://example.com/a")]).unwrap();

        assert_eq!(session.save().unwrap(), 2);
        assert_eq!(session.buffered().unwrap(), 0);
        assert_eq!(storage.count_session_queue("s1").unwrap(), 2);

        // A fresh session over the same store resumes the saved entries
        let resumed = CrawlSession::with_store("s1", FrontierConfig::default(), storage.clone());
        assert_eq!(resumed.poll().unwrap().unwrap().url, "http://example.com/");
    }

    #[test]
    fn test_delete_clears_everything() {
        let config = FrontierConfig {
            buffer_size: 1,
            ..FrontierConfig::default()
        };
        let (session, storage) = create_test_session(config);
        session
            .offer_all([candidate("http://example.com/a"), candidate("http://example.com/b")])
            .unwrap();

        session.delete().unwrap();

        assert_eq!(session.buffered().unwrap(), 0);
        assert_eq!(storage.count_session_queue("s1").unwrap(), 0);
        assert!(session.poll().unwrap().is_none());
        assert_eq!(session.offer_all([candidate("http://example.com/a")]).unwrap(), 1);
    }

    #[test]
    fn test_rename_moves_memory_and_store() {
        let config = FrontierConfig {
            buffer_size: 1,
            ..FrontierConfig::default()
        };
        let (session, storage) = create_test_session(config);
        session
            .offer_all([candidate("http://example.com/a"), candidate("http://example.com/b")])
            .unwrap();

        session.rename("s2").unwrap();

        assert_eq!(session.id().unwrap(), "s2");
        assert_eq!(storage.count_session_queue("s1").unwrap(), 0);
        assert_eq!(storage.count_session_queue("s2").unwrap(), 1);
        assert_eq!(session.poll().unwrap().unwrap().session_id, "s2");
        assert_eq!(session.poll().unwrap().unwrap().session_id, "s2");
    }

    #[test]
    fn test_generate_from_previous_results() {
        let config = FrontierConfig {
            generated_page_size: 2,
            ..FrontierConfig::default()
        };
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let modified = Utc::now();
        for i in 0..5 {
            let mut result =
                AccessResult::new("previous", format!("http://example.com/{}", i), ResultStatus::Ok);
            result.last_modified = Some(modified);
            storage.insert_result(&result).unwrap();
        }

        let session = CrawlSession::with_store("current", config, storage.clone());
        assert_eq!(session.generate_from_results("previous").unwrap(), 5);

        let first = session.poll().unwrap().unwrap();
        assert_eq!(first.url, "http://example.com/0");
        assert_eq!(first.session_id, "current");
        assert_eq!(first.depth, 0);
        assert_eq!(first.method, Method::Get);
        assert!(first.last_modified.is_some());
        assert_eq!(session.buffered().unwrap(), 4);
        assert_eq!(storage.count_session_queue("current").unwrap(), 0);
    }

    #[test]
    fn test_failed_overflow_write_queues_nothing() {
        let config = FrontierConfig {
            buffer_size: 1,
            ..FrontierConfig::default()
        };
        let queue_store = Arc::new(FlakyQueueStore::new());
        let result_store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let session = CrawlSession::new("s1", config, queue_store.clone(), result_store);

        let batch = [candidate("http://example.com/a"), candidate("http://example.com/b")];
        assert!(session.offer_all(batch.clone()).is_err());
        assert_eq!(session.buffered().unwrap(), 0);
        assert!(!session.visited(&candidate("http://example.com/a")).unwrap());
        assert!(!session.visited(&candidate("http://example.com/b")).unwrap());
        assert!(session.poll().unwrap().is_none());

        // Once the store recovers the same batch is accepted in full
        queue_store.failing.store(false, Ordering::SeqCst);
        assert_eq!(session.offer_all(batch).unwrap(), 2);
        assert_eq!(session.poll().unwrap().unwrap().url, "http://example.com/a");
        assert_eq!(session.poll().unwrap().unwrap().url, "http://example.com/b");
        assert!(session.poll().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_offers_accept_each_url_once() {
        let config = FrontierConfig {
            buffer_size: 8,
            page_size: 4,
            visited_cache_size: 16,
            ..FrontierConfig::default()
        };
        let (session, _) = create_test_session(config);
        let session = Arc::new(session);
        let urls: Vec<String> = (0..40).map(|i| format!("http://example.com/{}", i)).collect();

        // Every task offers an overlapping window of the same urls
        let mut handles = Vec::new();
        for task in 0..8 {
            let session = Arc::clone(&session);
            let window: Vec<String> = urls.iter().cycle().skip(task * 5).take(25).cloned().collect();
            handles.push(tokio::spawn(async move {
                let mut accepted = 0;
                for chunk in window.chunks(5) {
                    accepted += session
                        .offer_all(chunk.iter().map(|url| candidate(url)))
                        .unwrap();
                    tokio::task::yield_now().await;
                }
                accepted
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            accepted += handle.await.unwrap();
        }
        assert_eq!(accepted, urls.len());

        let mut pollers = Vec::new();
        for _ in 0..4 {
            let session = Arc::clone(&session);
            pollers.push(tokio::spawn(async move {
                let mut polled = Vec::new();
                while let Some(entry) = session.poll().unwrap() {
                    polled.push(entry.url);
                    tokio::task::yield_now().await;
                }
                polled
            }));
        }

        let mut polled = Vec::new();
        for poller in pollers {
            polled.extend(poller.await.unwrap());
        }
        assert_eq!(polled.len(), urls.len());
        let unique: HashSet<&String> = polled.iter().collect();
        assert_eq!(unique.len(), urls.len());
    }
}

//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the queue and
//! result store traits.

use crate::entity::{AccessResult, FrontierEntry, Method, ResultStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{AccessResultStore, StorageError, StorageResult, UrlQueueStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ENTRY_COLUMNS: &str =
    "id, session_id, url, method, parent_url, depth, metadata, last_modified, created_at";

const RESULT_COLUMNS: &str = "id, session_id, url, parent_url, method, http_status_code, mime_type,
     content_length, last_modified, execution_time_ms, status, error_message, created_at";

/// SQLite storage backend
///
/// The connection is guarded by a mutex so one instance can be shared by
/// every worker of a session.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }
}

impl UrlQueueStore for SqliteStorage {
    // ===== Insertion =====

    fn insert_entry(&self, entry: &FrontierEntry) -> StorageResult<i64> {
        let conn = self.conn()?;
        insert_entry_with(&conn, entry)?;
        Ok(conn.last_insert_rowid())
    }

    fn batch_insert_entries(&self, entries: &[FrontierEntry]) -> StorageResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for entry in entries {
            insert_entry_with(&tx, entry)?;
        }
        tx.commit()?;

        Ok(entries.len())
    }

    // ===== Retrieval =====

    fn select_entries(&self, session_id: &str, page_size: usize) -> StorageResult<Vec<FrontierEntry>> {
        let conn = self.conn()?;
        select_entries_with(&conn, session_id, page_size)
    }

    fn delete_entries(&self, ids: &[i64]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let deleted = delete_entries_with(&tx, ids)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Selects and deletes the page in one transaction
    fn claim_entries(&self, session_id: &str, page_size: usize) -> StorageResult<Vec<FrontierEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let entries = select_entries_with(&tx, session_id, page_size)?;
        let ids: Vec<i64> = entries.iter().filter_map(|entry| entry.id).collect();
        delete_entries_with(&tx, &ids)?;

        tx.commit()?;
        Ok(entries)
    }

    // ===== Lookup =====

    fn count_queued(&self, url: &str, session_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM url_queue WHERE session_id = ?1 AND url = ?2",
            params![session_id, url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_session_queue(&self, session_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM url_queue WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Session Management =====

    fn delete_queue_by_session(&self, session_id: &str) -> StorageResult<usize> {
        let deleted = self.conn()?.execute(
            "DELETE FROM url_queue WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    fn rename_queue_session(&self, old_session_id: &str, new_session_id: &str) -> StorageResult<usize> {
        let updated = self.conn()?.execute(
            "UPDATE url_queue SET session_id = ?1 WHERE session_id = ?2",
            params![new_session_id, old_session_id],
        )?;
        Ok(updated)
    }
}

impl AccessResultStore for SqliteStorage {
    fn insert_result(&self, result: &AccessResult) -> StorageResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO access_results (session_id, url, parent_url, method, http_status_code,
             mime_type, content_length, last_modified, execution_time_ms, status, error_message,
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                result.session_id,
                result.url,
                result.parent_url,
                result.method.as_str(),
                result.http_status_code.map(i64::from),
                result.mime_type,
                result.content_length.map(|len| len as i64),
                result.last_modified.map(|dt| dt.to_rfc3339()),
                result.execution_time_ms.map(|ms| ms as i64),
                result.status.to_db_string(),
                result.error_message,
                result.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn count_results(&self, url: &str, session_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM access_results WHERE session_id = ?1 AND url = ?2",
            params![session_id, url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_session_results(&self, session_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM access_results WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn select_results(&self, session_id: &str, offset: usize, limit: usize) -> StorageResult<Vec<AccessResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_results WHERE session_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
            RESULT_COLUMNS
        ))?;

        let results = stmt
            .query_map(params![session_id, limit as i64, offset as i64], result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    fn delete_results_by_session(&self, session_id: &str) -> StorageResult<usize> {
        let deleted = self.conn()?.execute(
            "DELETE FROM access_results WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    fn status_summary(&self, session_id: &str) -> StorageResult<HashMap<ResultStatus, u64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM access_results WHERE session_id = ?1 GROUP BY status",
        )?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map(params![session_id], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        for row in rows {
            let (status, count) = row?;
            if let Some(status) = ResultStatus::from_db_string(&status) {
                summary.insert(status, count as u64);
            }
        }

        Ok(summary)
    }
}

fn insert_entry_with(conn: &Connection, entry: &FrontierEntry) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO url_queue (session_id, url, method, parent_url, depth, metadata, last_modified, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.session_id,
            entry.url,
            entry.method.as_str(),
            entry.parent_url,
            entry.depth,
            entry.metadata,
            entry.last_modified.map(|dt| dt.to_rfc3339()),
            entry.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn select_entries_with(
    conn: &Connection,
    session_id: &str,
    page_size: usize,
) -> StorageResult<Vec<FrontierEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM url_queue WHERE session_id = ?1 ORDER BY id LIMIT ?2",
        ENTRY_COLUMNS
    ))?;

    let entries = stmt
        .query_map(params![session_id, page_size as i64], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn delete_entries_with(conn: &Connection, ids: &[i64]) -> StorageResult<usize> {
    let mut stmt = conn.prepare("DELETE FROM url_queue WHERE id = ?1")?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute(params![id])?;
    }
    Ok(deleted)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    Ok(FrontierEntry {
        id: Some(row.get(0)?),
        session_id: row.get(1)?,
        url: row.get(2)?,
        method: parse_method(&row.get::<_, String>(3)?),
        parent_url: row.get(4)?,
        depth: row.get(5)?,
        metadata: row.get(6)?,
        last_modified: parse_timestamp(row.get(7)?),
        created_at: parse_timestamp(row.get(8)?).unwrap_or_else(Utc::now),
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<AccessResult> {
    Ok(AccessResult {
        id: Some(row.get(0)?),
        session_id: row.get(1)?,
        url: row.get(2)?,
        parent_url: row.get(3)?,
        method: parse_method(&row.get::<_, String>(4)?),
        http_status_code: row
            .get::<_, Option<i64>>(5)?
            .and_then(|code| u16::try_from(code).ok()),
        mime_type: row.get(6)?,
        content_length: row.get::<_, Option<i64>>(7)?.map(|len| len as u64),
        last_modified: parse_timestamp(row.get(8)?),
        execution_time_ms: row.get::<_, Option<i64>>(9)?.map(|ms| ms as u64),
        status: ResultStatus::from_db_string(&row.get::<_, String>(10)?)
            .unwrap_or(ResultStatus::Failed),
        error_message: row.get(11)?,
        created_at: parse_timestamp(row.get(12)?).unwrap_or_else(Utc::now),
    })
}

fn parse_method(value: &str) -> Method {
    value.parse().unwrap_or_default()
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

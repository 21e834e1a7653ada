//! Database schema definitions
//!
//! This module contains the SQL schema for the queue and result tables.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Pending URLs per crawl session
CREATE TABLE IF NOT EXISTS url_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    parent_url TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    metadata TEXT,
    last_modified TEXT,
    created_at TEXT NOT NULL
);

-- Processed URLs per crawl session
CREATE TABLE IF NOT EXISTS access_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    parent_url TEXT,
    method TEXT NOT NULL,
    http_status_code INTEGER,
    mime_type TEXT,
    content_length INTEGER,
    last_modified TEXT,
    execution_time_ms INTEGER,
    status TEXT NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_url_queue_session ON url_queue(session_id, id);
CREATE INDEX IF NOT EXISTS idx_url_queue_url ON url_queue(session_id, url);
CREATE INDEX IF NOT EXISTS idx_access_results_url ON access_results(session_id, url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

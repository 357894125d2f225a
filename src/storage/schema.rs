//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the engine database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Saved crawl jobs and the state of their current/last run
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    config TEXT NOT NULL,
    schedule TEXT,
    status TEXT NOT NULL,
    pages_discovered INTEGER NOT NULL DEFAULT 0,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    pages_successful INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    pages_skipped INTEGER NOT NULL DEFAULT 0,
    total_words INTEGER NOT NULL DEFAULT 0,
    total_links INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

-- Extracted pages, one row per URL per run
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    run_number INTEGER NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    markdown TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    reading_time_minutes INTEGER NOT NULL,
    links TEXT NOT NULL,
    images TEXT NOT NULL,
    code_blocks TEXT NOT NULL,
    http_status INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    change_kind TEXT NOT NULL,
    UNIQUE(job_id, run_number, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(job_id, run_number);

-- Append-only statistics per run
CREATE TABLE IF NOT EXISTS run_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    run_number INTEGER NOT NULL,
    status TEXT NOT NULL,
    pages_successful INTEGER NOT NULL,
    pages_failed INTEGER NOT NULL,
    pages_skipped INTEGER NOT NULL,
    pages_new INTEGER NOT NULL,
    pages_changed INTEGER NOT NULL,
    pages_unchanged INTEGER NOT NULL,
    pages_removed INTEGER NOT NULL,
    total_words INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    UNIQUE(job_id, run_number)
);

-- Content signatures of each job's last completed run
CREATE TABLE IF NOT EXISTS page_snapshots (
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    PRIMARY KEY (job_id, url)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Gets the current schema version
pub fn get_schema_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["jobs", "pages", "run_history", "page_snapshots"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(get_schema_version(), 1);
    }
}

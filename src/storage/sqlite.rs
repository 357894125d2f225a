//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Timestamps are stored as RFC 3339 text and structured fields as JSON.

use crate::crawler::{ChangeKind, PageSignature};
use crate::job::{CrawlJob, CrawlRunHistory, ExtractedPage, JobCounters, JobId, NewJob};
use crate::state::JobStatus;
use crate::storage::schema::{get_schema_version, initialize_schema};
use crate::storage::traits::{Snapshot, Storage, StorageError, StorageResult};
use crate::storage::StoredPage;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

const JOB_COLUMNS: &str = "id, name, config, schedule, status, pages_discovered, pages_crawled,
    pages_successful, pages_failed, pages_skipped, total_words, total_links, error_count,
    started_at, completed_at, created_at";

const PAGE_COLUMNS: &str = "run_number, url, depth, title, description, markdown, word_count,
    reading_time_minutes, links, images, code_blocks, http_status, content_type, fetched_at,
    change_kind";

const HISTORY_COLUMNS: &str = "job_id, run_number, status, pages_successful, pages_failed,
    pages_skipped, pages_new, pages_changed, pages_unchanged, pages_removed, total_words,
    started_at, completed_at, duration_ms";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::with_connection(conn)
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        initialize_schema(&conn)?;
        conn.pragma_update(None, "user_version", get_schema_version())?;
        Ok(Self { conn })
    }

    fn query_jobs(&self, sql: &str, status: Option<JobStatus>) -> StorageResult<Vec<CrawlJob>> {
        let mut stmt = self.conn.prepare(sql)?;
        let jobs = match status {
            Some(status) => stmt
                .query_map(params![status.to_db_string()], job_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], job_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(jobs)
    }

    fn ensure_updated(job_id: JobId, rows: usize) -> StorageResult<()> {
        if rows == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Jobs =====

    fn insert_job(&mut self, job: &NewJob) -> StorageResult<JobId> {
        let config = serde_json::to_string(&job.config)?;
        let schedule = job
            .schedule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO jobs (name, config, schedule, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.name,
                config,
                schedule,
                JobStatus::Idle.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: JobId) -> StorageResult<Option<CrawlJob>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        let job = self
            .conn
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>> {
        let sql = format!("SELECT {} FROM jobs ORDER BY id", JOB_COLUMNS);
        self.query_jobs(&sql, None)
    }

    fn jobs_with_status(&self, statuses: &[JobStatus]) -> StorageResult<Vec<CrawlJob>> {
        let sql = format!("SELECT {} FROM jobs WHERE status = ?1", JOB_COLUMNS);
        let mut jobs = Vec::new();
        for status in statuses {
            jobs.extend(self.query_jobs(&sql, Some(*status))?);
        }
        jobs.sort_by_key(|job| job.id);
        jobs.dedup_by_key(|job| job.id);
        Ok(jobs)
    }

    // ===== Run Lifecycle =====

    fn set_job_status(&mut self, job_id: JobId, status: JobStatus) -> StorageResult<()> {
        let rows = self.conn.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), job_id],
        )?;
        Self::ensure_updated(job_id, rows)
    }

    fn mark_run_started(&mut self, job_id: JobId, started_at: DateTime<Utc>) -> StorageResult<()> {
        let rows = self.conn.execute(
            "UPDATE jobs SET
                pages_discovered = 0, pages_crawled = 0, pages_successful = 0,
                pages_failed = 0, pages_skipped = 0, total_words = 0,
                total_links = 0, error_count = 0,
                started_at = ?1, completed_at = NULL
             WHERE id = ?2",
            params![started_at.to_rfc3339(), job_id],
        )?;
        Self::ensure_updated(job_id, rows)
    }

    fn mark_run_finished(
        &mut self,
        job_id: JobId,
        status: JobStatus,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let rows = self.conn.execute(
            "UPDATE jobs SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), completed_at.to_rfc3339(), job_id],
        )?;
        Self::ensure_updated(job_id, rows)
    }

    fn update_job_counters(&mut self, job_id: JobId, delta: &JobCounters) -> StorageResult<()> {
        let rows = self.conn.execute(
            "UPDATE jobs SET
                pages_discovered = pages_discovered + ?1,
                pages_crawled = pages_crawled + ?2,
                pages_successful = pages_successful + ?3,
                pages_failed = pages_failed + ?4,
                pages_skipped = pages_skipped + ?5,
                total_words = total_words + ?6,
                total_links = total_links + ?7,
                error_count = error_count + ?8
             WHERE id = ?9",
            params![
                to_i64(delta.pages_discovered),
                to_i64(delta.pages_crawled),
                to_i64(delta.pages_successful),
                to_i64(delta.pages_failed),
                to_i64(delta.pages_skipped),
                to_i64(delta.total_words),
                to_i64(delta.total_links),
                to_i64(delta.error_count),
                job_id
            ],
        )?;
        Self::ensure_updated(job_id, rows)
    }

    // ===== Pages =====

    fn save_page(
        &mut self,
        job_id: JobId,
        run_number: u32,
        page: &ExtractedPage,
        change: ChangeKind,
    ) -> StorageResult<()> {
        let links = serde_json::to_string(&page.links)?;
        let images = serde_json::to_string(&page.images)?;
        let code_blocks = serde_json::to_string(&page.code_blocks)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO pages (job_id, run_number, url, depth, title, description,
                markdown, word_count, reading_time_minutes, links, images, code_blocks,
                http_status, content_type, fetched_at, change_kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                job_id,
                run_number,
                page.url,
                page.depth,
                page.title,
                page.description,
                page.markdown,
                to_i64(page.raw_word_count),
                to_i64(page.reading_time_minutes),
                links,
                images,
                code_blocks,
                page.http_status,
                page.content_type,
                page.fetched_at.to_rfc3339(),
                change.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn pages_for_run(&self, job_id: JobId, run_number: u32) -> StorageResult<Vec<StoredPage>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE job_id = ?1 AND run_number = ?2 ORDER BY id",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![job_id, run_number], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    // ===== Run History =====

    fn save_run_history(&mut self, record: &CrawlRunHistory) -> StorageResult<()> {
        let result = self.conn.execute(
            "INSERT INTO run_history (job_id, run_number, status, pages_successful, pages_failed,
                pages_skipped, pages_new, pages_changed, pages_unchanged, pages_removed,
                total_words, started_at, completed_at, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.job_id,
                record.run_number,
                record.status.to_db_string(),
                to_i64(record.pages_successful),
                to_i64(record.pages_failed),
                to_i64(record.pages_skipped),
                to_i64(record.pages_new),
                to_i64(record.pages_changed),
                to_i64(record.pages_unchanged),
                to_i64(record.pages_removed),
                to_i64(record.total_words),
                record.started_at.to_rfc3339(),
                record.completed_at.to_rfc3339(),
                to_i64(record.duration_ms)
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::ConstraintViolation(format!(
                    "run {} of job {} already recorded",
                    record.run_number, record.job_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn run_history(&self, job_id: JobId) -> StorageResult<Vec<CrawlRunHistory>> {
        let sql = format!(
            "SELECT {} FROM run_history WHERE job_id = ?1 ORDER BY run_number",
            HISTORY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![job_id], history_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn latest_run_number(&self, job_id: JobId) -> StorageResult<u32> {
        let latest: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(run_number), 0) FROM run_history WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    // ===== Diff Snapshot =====

    fn load_snapshot(&self, job_id: JobId) -> StorageResult<Snapshot> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, content_hash, word_count FROM page_snapshots WHERE job_id = ?1")?;
        let rows = stmt.query_map(params![job_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                PageSignature {
                    content_hash: row.get(1)?,
                    word_count: get_u64(row, 2)?,
                },
            ))
        })?;

        let mut snapshot = Snapshot::new();
        for row in rows {
            let (url, signature) = row?;
            snapshot.insert(url, signature);
        }
        Ok(snapshot)
    }

    fn replace_snapshot(&mut self, job_id: JobId, snapshot: &Snapshot) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM page_snapshots WHERE job_id = ?1", params![job_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_snapshots (job_id, url, content_hash, word_count) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (url, signature) in snapshot {
                stmt.execute(params![
                    job_id,
                    url,
                    signature.content_hash,
                    to_i64(signature.word_count)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ===== Row Mapping =====

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlJob> {
    let config: String = row.get(2)?;
    let schedule: Option<String> = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(CrawlJob {
        id: row.get(0)?,
        name: row.get(1)?,
        config: from_json(2, &config)?,
        schedule: schedule.as_deref().map(|s| from_json(3, s)).transpose()?,
        status: parse_status(4, &status)?,
        counters: JobCounters {
            pages_discovered: get_u64(row, 5)?,
            pages_crawled: get_u64(row, 6)?,
            pages_successful: get_u64(row, 7)?,
            pages_failed: get_u64(row, 8)?,
            pages_skipped: get_u64(row, 9)?,
            total_words: get_u64(row, 10)?,
            total_links: get_u64(row, 11)?,
            error_count: get_u64(row, 12)?,
        },
        started_at: get_optional_time(row, 13)?,
        completed_at: get_optional_time(row, 14)?,
        created_at: get_time(row, 15)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPage> {
    let links: String = row.get(8)?;
    let images: String = row.get(9)?;
    let code_blocks: String = row.get(10)?;
    let change: String = row.get(14)?;

    Ok(StoredPage {
        run_number: row.get(0)?,
        change: ChangeKind::from_db_string(&change).ok_or_else(|| {
            conversion_error(14, StorageError::Database(format!("unknown change kind '{}'", change)))
        })?,
        page: ExtractedPage {
            url: row.get(1)?,
            depth: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            markdown: row.get(5)?,
            raw_word_count: get_u64(row, 6)?,
            reading_time_minutes: get_u64(row, 7)?,
            links: from_json(8, &links)?,
            images: from_json(9, &images)?,
            code_blocks: from_json(10, &code_blocks)?,
            http_status: row.get(11)?,
            content_type: row.get(12)?,
            fetched_at: get_time(row, 13)?,
        },
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlRunHistory> {
    let status: String = row.get(2)?;

    Ok(CrawlRunHistory {
        job_id: row.get(0)?,
        run_number: row.get(1)?,
        status: parse_status(2, &status)?,
        pages_successful: get_u64(row, 3)?,
        pages_failed: get_u64(row, 4)?,
        pages_skipped: get_u64(row, 5)?,
        pages_new: get_u64(row, 6)?,
        pages_changed: get_u64(row, 7)?,
        pages_unchanged: get_u64(row, 8)?,
        pages_removed: get_u64(row, 9)?,
        total_words: get_u64(row, 10)?,
        started_at: get_time(row, 11)?,
        completed_at: get_time(row, 12)?,
        duration_ms: get_u64(row, 13)?,
    })
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_status(idx: usize, value: &str) -> rusqlite::Result<JobStatus> {
    JobStatus::from_db_string(value).ok_or_else(|| {
        conversion_error(idx, StorageError::Database(format!("unknown job status '{}'", value)))
    })
}

fn from_json<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| conversion_error(idx, e))
}

fn get_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_time(idx, &value)
}

fn get_optional_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value.map(|v| parse_time(idx, &v)).transpose()
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

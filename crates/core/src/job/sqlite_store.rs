//! SQLite-backed job ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CreateJobRequest, Job, JobError, JobFilter, JobStatus, JobStore};

const JOB_COLUMNS: &str = "id, source_url, media_kind, quality, extension, title, source_profile, status, created_at, completed_at, bytes_streamed, error";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                quality TEXT NOT NULL,
                extension TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                source_profile TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                bytes_streamed INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection mutex poisoned".to_string()))
    }

    fn timestamp(dt: &DateTime<Utc>) -> String {
        // Fixed-width so lexical order matches chronological order.
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let media_kind: String = row.get(2)?;
        let source_profile: String = row.get(6)?;
        let status: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let completed_at: Option<String> = row.get(9)?;
        let bytes_streamed: i64 = row.get(10)?;

        let parse_err = |idx: usize, msg: String| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                msg.into(),
            )
        };

        Ok(Job {
            id: row.get(0)?,
            source_url: row.get(1)?,
            media_kind: media_kind.parse().map_err(|e| parse_err(2, e))?,
            quality: row.get(3)?,
            extension: row.get(4)?,
            title: row.get(5)?,
            source_profile: source_profile.parse().map_err(|e| parse_err(6, e))?,
            status: status.parse().map_err(|e| parse_err(7, e))?,
            created_at: Self::parse_timestamp(&created_at),
            completed_at: completed_at.as_deref().map(Self::parse_timestamp),
            bytes_streamed: bytes_streamed.max(0) as u64,
            error: row.get(11)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Job>, JobError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_job)
            .optional()?)
    }

    fn fetch_existing(conn: &Connection, id: &str) -> Result<Job, JobError> {
        Self::fetch(conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn check_transition(job: &Job, next: JobStatus) -> Result<(), JobError> {
        if job.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.status,
                to: next,
            })
        }
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        let conn = self.conn()?;

        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            source_url: request.source_url,
            media_kind: request.media_kind,
            quality: request.quality,
            extension: request.extension,
            title: request.title,
            source_profile: request.source_profile,
            status: JobStatus::Created,
            created_at: Utc::now(),
            completed_at: None,
            bytes_streamed: 0,
            error: None,
        };

        conn.execute(
            "INSERT INTO jobs (id, source_url, media_kind, quality, extension, title, source_profile, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                job.id,
                job.source_url,
                job.media_kind.as_str(),
                job.quality,
                job.extension,
                job.title,
                job.source_profile.as_str(),
                job.status.as_str(),
                Self::timestamp(&job.created_at),
            ],
        )?;

        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.conn()?;

        let status = filter.status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {} FROM jobs WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            JOB_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![status, filter.limit, filter.offset],
            Self::row_to_job,
        )?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError> {
        let conn = self.conn()?;
        let status = filter.status.map(|s| s.as_str());
        let count = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE (?1 IS NULL OR status = ?1)",
            params![status],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_title(&self, id: &str, title: &str) -> Result<Job, JobError> {
        let conn = self.conn()?;
        let mut job = Self::fetch_existing(&conn, id)?;

        if job.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                job_id: job.id,
                from: job.status,
                to: job.status,
            });
        }

        conn.execute(
            "UPDATE jobs SET title = ? WHERE id = ?",
            params![title, id],
        )?;
        job.title = title.to_string();
        Ok(job)
    }

    fn update_status(&self, id: &str, status: JobStatus) -> Result<Job, JobError> {
        if status.is_terminal() {
            return self.finish(id, status, 0, None);
        }

        let conn = self.conn()?;
        let mut job = Self::fetch_existing(&conn, id)?;
        Self::check_transition(&job, status)?;

        conn.execute(
            "UPDATE jobs SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        job.status = status;
        Ok(job)
    }

    fn finish(
        &self,
        id: &str,
        status: JobStatus,
        bytes_streamed: u64,
        error: Option<String>,
    ) -> Result<Job, JobError> {
        let conn = self.conn()?;
        let mut job = Self::fetch_existing(&conn, id)?;

        if !status.is_terminal() {
            return Err(JobError::InvalidTransition {
                job_id: job.id,
                from: job.status,
                to: status,
            });
        }
        Self::check_transition(&job, status)?;

        let completed_at = Utc::now();
        conn.execute(
            "UPDATE jobs SET status = ?, completed_at = ?, bytes_streamed = ?, error = ? WHERE id = ?",
            params![
                status.as_str(),
                Self::timestamp(&completed_at),
                bytes_streamed.min(i64::MAX as u64) as i64,
                error,
                id,
            ],
        )?;

        job.status = status;
        job.completed_at = Some(completed_at);
        job.bytes_streamed = bytes_streamed;
        job.error = error;
        Ok(job)
    }
}

//! Job storage trait and types.

use thiserror::Error;

use crate::args::SourceProfile;
use crate::job::{Job, JobStatus, MediaKind};

/// Error type for job ledger operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The requested status change would move the job backwards.
    #[error("Cannot move job {job_id} from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for JobError {
    fn from(e: rusqlite::Error) -> Self {
        JobError::Database(e.to_string())
    }
}

/// Request to create a new job row.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub source_url: String,
    pub media_kind: MediaKind,
    pub quality: String,
    pub extension: String,
    pub source_profile: SourceProfile,
    /// Initial title; the orchestrator replaces it once resolved.
    pub title: String,
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job ledger backends.
///
/// Implementations must be safe to share between concurrently running pipelines.
pub trait JobStore: Send + Sync {
    /// Create a new job in `created` status.
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    /// Get a job by ID.
    fn get(&self, id: &str) -> Result<Option<Job>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// Count jobs matching the filter (limit and offset are ignored).
    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Replace the title of a job that has not finished yet.
    fn update_title(&self, id: &str, title: &str) -> Result<Job, JobError>;

    /// Advance a job to a non-terminal status.
    fn update_status(&self, id: &str, status: JobStatus) -> Result<Job, JobError>;

    /// Move a job to a terminal status, recording delivered bytes and an optional error.
    fn finish(
        &self,
        id: &str,
        status: JobStatus,
        bytes_streamed: u64,
        error: Option<String>,
    ) -> Result<Job, JobError>;
}

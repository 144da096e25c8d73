//! Job API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tubepipe_core::{CreateJob, Job, JobFilter, JobStatus, MediaKind};

use super::{error_response, orchestrator_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// Source page URL
    pub url: Option<String>,
    /// `audio`, otherwise video
    pub format: Option<String>,
    /// Quality token such as `720p` or `128k`
    pub quality: Option<String>,
    /// Output container extension
    pub extension: Option<String>,
}

/// Response for a created job
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub id: String,
    pub title: String,
    pub source_profile: String,
    pub stream_url: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for job queries
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub url: String,
    pub title: String,
    pub format: MediaKind,
    pub quality: String,
    pub extension: String,
    pub source_profile: String,
    pub status: JobStatus,
    pub bytes_streamed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            url: job.source_url,
            title: job.title,
            format: job.media_kind,
            quality: job.quality,
            extension: job.extension,
            source_profile: job.source_profile.to_string(),
            status: job.status,
            bytes_streamed: job.bytes_streamed,
            error: job.error,
            created_at: job.created_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateJobBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let Json(body) = body.map_err(|e| {
        tracing::debug!("Rejected job body: {}", e);
        error_response(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    // Anything other than an explicit audio request is treated as video.
    let media_kind = match body.format.as_deref() {
        Some("audio") => MediaKind::Audio,
        _ => MediaKind::Video,
    };

    let request = CreateJob {
        url: body.url.unwrap_or_default(),
        media_kind,
        quality: body.quality,
        extension: body.extension,
    };

    match state.orchestrator().create_job(request).await {
        Ok(job) => Ok((
            StatusCode::CREATED,
            Json(CreateJobResponse {
                stream_url: format!("/api/jobs/{}/stream", job.id),
                id: job.id,
                title: job.title,
                source_profile: job.source_profile.to_string(),
            }),
        )),
        Err(e) => Err(orchestrator_error(&e)),
    }
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    match state.job_store().get(&id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// List jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        match status.parse::<JobStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e)),
        }
    }

    let jobs = match state.job_store().list(&filter) {
        Ok(jobs) => jobs,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    let total = match state.job_store().count(&filter) {
        Ok(count) => count,
        Err(e) => {
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ));
        }
    };

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

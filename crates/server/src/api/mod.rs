pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod stream;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tubepipe_core::{JobError, OrchestratorError};

pub use routes::create_router;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Status and JSON body returned by failing handlers.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Maps orchestrator errors onto HTTP statuses.
pub(crate) fn orchestrator_error(e: &OrchestratorError) -> ApiError {
    let status = match e {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) | OrchestratorError::Store(JobError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::AlreadyStreaming(_) => StatusCode::CONFLICT,
        OrchestratorError::Spawn(_) | OrchestratorError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

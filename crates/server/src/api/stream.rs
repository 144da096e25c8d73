//! Streaming endpoint: pipes a job's pipeline output into the response body.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::{error_response, orchestrator_error};
use crate::state::AppState;

/// Start a job's pipeline and stream its output.
///
/// The body is chunked; no `Content-Length` is sent. The pipeline runs on
/// its own task writing into an in-memory pipe, so a client that goes away
/// surfaces there as a write failure.
pub async fn stream_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let orchestrator = Arc::clone(state.orchestrator());

    let active = match orchestrator.open_stream(&id).await {
        Ok(active) => active,
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "Failed to open stream");
            return orchestrator_error(&e).into_response();
        }
    };

    let content_type = active.content_type();
    let content_disposition = active.content_disposition().to_string();

    // One pooled buffer's worth of slack between the pipeline and the body.
    let (writer, reader) = tokio::io::duplex(orchestrator.context().pool.buffer_size());

    tokio::spawn(async move {
        let outcome = orchestrator.run_stream(active, writer).await;
        tracing::debug!(
            job_id = %outcome.job_id,
            status = %outcome.status,
            bytes = outcome.bytes,
            "Stream task finished"
        );
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReaderStream::new(reader)));

    match response {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "Failed to build stream response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tubepipe_core::args::{extensions, AUDIO_QUALITIES, VIDEO_QUALITIES};
use tubepipe_core::MediaKind;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Qualities and containers a client may request.
#[derive(Serialize)]
pub struct FormatsResponse {
    pub video_qualities: Vec<&'static str>,
    pub audio_qualities: Vec<&'static str>,
    pub video_formats: Vec<&'static str>,
    pub audio_formats: Vec<&'static str>,
}

pub async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        video_qualities: VIDEO_QUALITIES.to_vec(),
        audio_qualities: AUDIO_QUALITIES.to_vec(),
        video_formats: extensions(MediaKind::Video),
        audio_formats: extensions(MediaKind::Audio),
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);

    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

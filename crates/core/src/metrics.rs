//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job ledger (jobs created, final statuses)
//! - Stream pipelines (spawns, active streams, bytes, durations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs created total by media kind.
pub static JOBS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubepipe_jobs_created_total", "Total jobs created"),
        &["media_kind"], // "video", "audio"
    )
    .unwrap()
});

/// Jobs finished total by terminal status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubepipe_jobs_finished_total", "Total jobs that reached a terminal status"),
        &["status"], // "completed", "failed"
    )
    .unwrap()
});

/// Title lookups that fell back to a synthesized name.
pub static TITLE_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubepipe_title_fallbacks_total",
        "Total title lookups that used a fallback title",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipelines currently streaming.
pub static ACTIVE_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tubepipe_active_streams", "Pipelines currently streaming").unwrap()
});

/// Process spawn failures by stage.
pub static SPAWN_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubepipe_spawn_failures_total", "Total process spawn failures"),
        &["stage"], // "acquisition", "transcode"
    )
    .unwrap()
});

/// Forwarding runs by outcome.
pub static STREAMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tubepipe_streams_total", "Total stream forwarding runs"),
        &["outcome"], // "end_of_stream", "sink_closed", "read_failed", "deadline_exceeded"
    )
    .unwrap()
});

/// Bytes delivered to clients.
pub static BYTES_STREAMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubepipe_bytes_streamed_total",
        "Total bytes forwarded to clients",
    )
    .unwrap()
});

/// Upstream process failures detected after the output drained.
pub static UPSTREAM_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tubepipe_upstream_failures_total",
        "Total pipelines where a process exited non-zero",
    )
    .unwrap()
});

/// Stream duration in seconds.
pub static STREAM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tubepipe_stream_duration_seconds", "Duration of stream pipelines")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["status"], // "completed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_CREATED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(TITLE_FALLBACKS.clone()),
        // Pipeline
        Box::new(ACTIVE_STREAMS.clone()),
        Box::new(SPAWN_FAILURES.clone()),
        Box::new(STREAMS_TOTAL.clone()),
        Box::new(BYTES_STREAMED.clone()),
        Box::new(UPSTREAM_FAILURES.clone()),
        Box::new(STREAM_DURATION.clone()),
    ]
}

//! Types for the stream orchestrator.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::ChildStdout;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::job::{Job, JobError, JobStatus, JobStore, MediaKind};
use crate::metrics;
use crate::pipeline::{ForwardOutcome, PipelineError, PipelineExit, ProcessPipeline};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Request rejected before anything was recorded.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Job was already streamed or is streaming right now.
    #[error("job {0} has already been streamed")]
    AlreadyStreaming(String),

    /// The pipeline could not be started.
    #[error("failed to start pipeline: {0}")]
    Spawn(#[source] PipelineError),

    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobError),
}

/// Input for [`StreamOrchestrator::create_job`](super::StreamOrchestrator::create_job).
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub url: String,
    pub media_kind: MediaKind,
    /// Quality token; `best` when absent.
    pub quality: Option<String>,
    /// Container extension; the kind's default when absent or unsupported.
    pub extension: Option<String>,
}

impl CreateJob {
    pub fn new(url: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            media_kind,
            quality: None,
            extension: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// Error recorded for a stream dropped before its outcome was settled.
pub const ABANDONED_ERROR: &str = "stream abandoned";

/// Membership of a job in the orchestrator's set of live streams.
///
/// Removes the job id from the set when dropped. Once armed, dropping it
/// before [`disarm`](Self::disarm) records the job as failed.
pub(crate) struct ActiveSlot {
    job_id: String,
    active: Arc<Mutex<HashSet<String>>>,
    ledger: Option<SlotLedger>,
}

struct SlotLedger {
    jobs: Arc<dyn JobStore>,
    bytes: Arc<AtomicU64>,
}

impl ActiveSlot {
    /// Claims `job_id`, or returns `None` if it is already live.
    pub(crate) fn claim(active: &Arc<Mutex<HashSet<String>>>, job_id: &str) -> Option<Self> {
        let mut set = active.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(job_id.to_string()) {
            return None;
        }
        metrics::ACTIVE_STREAMS.inc();
        Some(Self {
            job_id: job_id.to_string(),
            active: active.clone(),
            ledger: None,
        })
    }

    /// Makes the slot responsible for the job's terminal status. Returns the
    /// byte counter recorded if the stream is abandoned.
    pub(crate) fn arm(&mut self, jobs: Arc<dyn JobStore>) -> Arc<AtomicU64> {
        let bytes = Arc::new(AtomicU64::new(0));
        self.ledger = Some(SlotLedger {
            jobs,
            bytes: bytes.clone(),
        });
        bytes
    }

    /// The caller has settled the job itself.
    pub(crate) fn disarm(&mut self) {
        self.ledger = None;
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            let bytes = ledger.bytes.load(Ordering::Relaxed);
            warn!("Job {} abandoned after {} bytes", self.job_id, bytes);
            match ledger.jobs.finish(
                &self.job_id,
                JobStatus::Failed,
                bytes,
                Some(ABANDONED_ERROR.to_string()),
            ) {
                Ok(_) => metrics::JOBS_FINISHED
                    .with_label_values(&[JobStatus::Failed.as_str()])
                    .inc(),
                Err(e) => error!("Failed to record abandoned job {}: {}", self.job_id, e),
            }
        }

        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.job_id);
        metrics::ACTIVE_STREAMS.dec();
    }
}

/// A started pipeline ready to be forwarded into a sink.
///
/// Produced by [`StreamOrchestrator::open_stream`](super::StreamOrchestrator::open_stream)
/// so callers can commit response headers before any byte flows. Dropping it
/// without running it kills the processes and records the job as failed.
pub struct ActiveStream {
    pub(crate) job: Job,
    pub(crate) content_type: &'static str,
    pub(crate) content_disposition: String,
    pub(crate) pipeline: ProcessPipeline,
    pub(crate) output: ChildStdout,
    pub(crate) started_at: Instant,
    pub(crate) bytes: Arc<AtomicU64>,
    pub(crate) slot: ActiveSlot,
}

impl std::fmt::Debug for ActiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveStream")
            .field("job", &self.job)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("started_at", &self.started_at)
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl ActiveStream {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// MIME type of the transcoded output.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// `Content-Disposition` header value offering the output as a download.
    pub fn content_disposition(&self) -> &str {
        &self.content_disposition
    }
}

/// Final result of a stream run.
#[derive(Debug)]
pub struct StreamOutcome {
    pub job_id: String,
    /// Terminal status recorded in the ledger.
    pub status: JobStatus,
    /// Bytes accepted by the sink.
    pub bytes: u64,
    pub forward: ForwardOutcome,
    pub exit: PipelineExit,
    /// Diagnostic recorded with the job, if any.
    pub error: Option<String>,
}

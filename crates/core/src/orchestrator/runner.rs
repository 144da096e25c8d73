//! Stream orchestrator implementation.
//!
//! Ties the pieces together for one job:
//! - Create: validate, normalize, record the row, resolve the title
//! - Open: start the process pipeline and mark the job streaming
//! - Run: forward bytes to the sink, tear down, record the terminal status

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::args::{build_acquisition_args, build_transcode_args, container_for, SourceProfile};
use crate::config::{Config, LateFailurePolicy, StreamingConfig, ToolsConfig};
use crate::job::{CreateJobRequest, Job, JobStatus, JobStore};
use crate::metrics;
use crate::pipeline::{
    forward, BufferPool, CommandSpec, ForwardOptions, ForwardOutcome, PipelineError, PipelineExit,
    PipelineSpec, ProcessPipeline,
};
use crate::title::{content_disposition, fallback_title, CommandTitleResolver, TitleResolver};

use super::types::{ActiveSlot, ActiveStream, CreateJob, OrchestratorError, StreamOutcome};

/// Everything a stream needs, built once at startup.
pub struct StreamContext {
    pub jobs: Arc<dyn JobStore>,
    pub pool: Arc<BufferPool>,
    pub tools: ToolsConfig,
    pub streaming: StreamingConfig,
    pub titles: Arc<dyn TitleResolver>,
}

impl StreamContext {
    /// Context backed by the configured tools.
    pub fn new(config: &Config, jobs: Arc<dyn JobStore>) -> Self {
        let titles = Arc::new(CommandTitleResolver::new(
            config.tools.acquisition_path.clone(),
            Duration::from_secs(config.tools.title_timeout_secs),
        ));

        Self {
            jobs,
            pool: Arc::new(BufferPool::from_config(&config.streaming)),
            tools: config.tools.clone(),
            streaming: config.streaming.clone(),
            titles,
        }
    }

    /// Replace the title resolver.
    pub fn with_title_resolver(mut self, titles: Arc<dyn TitleResolver>) -> Self {
        self.titles = titles;
        self
    }
}

/// Runs jobs from creation to a terminal ledger status.
pub struct StreamOrchestrator {
    ctx: Arc<StreamContext>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl StreamOrchestrator {
    pub fn new(ctx: StreamContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn context(&self) -> &StreamContext {
        &self.ctx
    }

    /// Number of jobs with a live pipeline.
    pub fn active_streams(&self) -> usize {
        self.active.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Validate a request, record the job and resolve its title.
    pub async fn create_job(&self, request: CreateJob) -> Result<Job, OrchestratorError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(OrchestratorError::Validation("url is required".to_string()));
        }

        let kind = request.media_kind;
        let quality = request
            .quality
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or("best")
            .to_string();
        let extension = container_for(kind, request.extension.as_deref().unwrap_or_default())
            .extension
            .to_string();
        let profile = SourceProfile::detect(url);

        let job = self.ctx.jobs.create(CreateJobRequest {
            source_url: url.to_string(),
            media_kind: kind,
            quality,
            extension,
            source_profile: profile,
            title: String::new(),
        })?;
        metrics::JOBS_CREATED
            .with_label_values(&[kind.as_str()])
            .inc();
        info!(
            "Created job {} ({} {} {}, profile {})",
            job.id, kind, job.quality, job.extension, profile
        );

        let title = self.ctx.titles.resolve(url, profile).await;
        let job = self.ctx.jobs.update_title(&job.id, &title)?;

        Ok(job)
    }

    /// Argument vectors for both processes of `job`.
    pub fn pipeline_spec(&self, job: &Job) -> PipelineSpec {
        PipelineSpec {
            acquisition: CommandSpec::new(
                self.ctx.tools.acquisition_path.clone(),
                build_acquisition_args(
                    &job.source_url,
                    job.media_kind,
                    &job.quality,
                    job.source_profile,
                ),
            ),
            transcode: CommandSpec::new(
                self.ctx.tools.transcode_path.clone(),
                build_transcode_args(job.media_kind, &job.extension, &job.quality),
            ),
        }
    }

    /// Start the pipeline for a freshly created job.
    ///
    /// Every job can be streamed once. On spawn failure the job is marked
    /// failed before the error is returned.
    pub async fn open_stream(&self, job_id: &str) -> Result<ActiveStream, OrchestratorError> {
        let job = self
            .ctx
            .jobs
            .get(job_id)?
            .ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;

        if job.status != JobStatus::Created {
            return Err(OrchestratorError::AlreadyStreaming(job.id));
        }
        let mut slot = ActiveSlot::claim(&self.active, &job.id)
            .ok_or_else(|| OrchestratorError::AlreadyStreaming(job.id.clone()))?;

        let mut pipeline = ProcessPipeline::new(job.id.clone(), self.pipeline_spec(&job));
        let started_at = Instant::now();

        let output = match pipeline.start().await {
            Ok(()) => pipeline.take_output(),
            Err(e) => Err(e),
        };
        let output = match output {
            Ok(output) => output,
            Err(e) => return Err(self.abort_start(&job.id, &mut pipeline, e).await),
        };

        let bytes = slot.arm(Arc::clone(&self.ctx.jobs));
        let job = match self.mark_streaming(&job.id) {
            Ok(job) => job,
            Err(e) => {
                pipeline.close().await;
                slot.disarm();
                self.finish(&job.id, JobStatus::Failed, 0, Some(e.to_string()));
                return Err(e.into());
            }
        };

        let title = if job.title.is_empty() {
            fallback_title()
        } else {
            job.title.clone()
        };
        info!("Streaming job {} as '{}.{}'", job.id, title, job.extension);

        Ok(ActiveStream {
            content_type: container_for(job.media_kind, &job.extension).content_type,
            content_disposition: content_disposition(&title, &job.extension),
            job,
            pipeline,
            output,
            started_at,
            bytes,
            slot,
        })
    }

    /// Forward a started pipeline into `sink`, tear it down and record the
    /// terminal status. The sink is shut down only after the ledger is updated.
    pub async fn run_stream<W>(&self, stream: ActiveStream, sink: W) -> StreamOutcome
    where
        W: AsyncWrite + Unpin,
    {
        // If this future is dropped early, the slot records the job as failed.
        let ActiveStream {
            job,
            mut pipeline,
            output,
            started_at,
            bytes,
            mut slot,
            ..
        } = stream;
        let mut sink = sink;

        let options =
            ForwardOptions::from_config(&self.ctx.streaming, started_at).with_progress(bytes);
        let report = forward(output, &mut sink, &self.ctx.pool, &options).await;

        if matches!(report.outcome, ForwardOutcome::EndOfStream) {
            if let Err(e) = pipeline.mark_drained() {
                warn!("Job {}: {}", job.id, e);
            }
        }
        let exit = pipeline.close().await;

        let (status, error) = settle(
            &report.outcome,
            report.bytes,
            &exit,
            self.ctx.streaming.late_failure_policy,
        );

        metrics::STREAMS_TOTAL
            .with_label_values(&[report.outcome.as_str()])
            .inc();
        metrics::BYTES_STREAMED.inc_by(report.bytes);
        if exit.upstream_failed() {
            metrics::UPSTREAM_FAILURES.inc();
        }
        metrics::STREAM_DURATION
            .with_label_values(&[status.as_str()])
            .observe(started_at.elapsed().as_secs_f64());

        match (&report.outcome, status) {
            (ForwardOutcome::SinkClosed(e), _) => info!(
                "Job {}: client went away after {} bytes ({})",
                job.id, report.bytes, e
            ),
            (_, JobStatus::Failed) => warn!(
                "Job {} failed after {} bytes: {}",
                job.id,
                report.bytes,
                error.as_deref().unwrap_or("unknown error")
            ),
            _ => info!("Job {} completed, {} bytes streamed", job.id, report.bytes),
        }

        slot.disarm();
        self.finish(&job.id, status, report.bytes, error.clone());
        drop(slot);
        let _ = sink.shutdown().await;

        StreamOutcome {
            job_id: job.id,
            status,
            bytes: report.bytes,
            forward: report.outcome,
            exit,
            error,
        }
    }

    /// Open and run a stream in one call.
    pub async fn stream_job<W>(&self, job_id: &str, sink: W) -> Result<StreamOutcome, OrchestratorError>
    where
        W: AsyncWrite + Unpin,
    {
        let stream = self.open_stream(job_id).await?;
        Ok(self.run_stream(stream, sink).await)
    }

    fn mark_streaming(&self, job_id: &str) -> Result<Job, crate::job::JobError> {
        self.ctx.jobs.update_status(job_id, JobStatus::Acquiring)?;
        self.ctx.jobs.update_status(job_id, JobStatus::Streaming)
    }

    async fn abort_start(
        &self,
        job_id: &str,
        pipeline: &mut ProcessPipeline,
        e: PipelineError,
    ) -> OrchestratorError {
        if let Some(stage) = e.stage() {
            metrics::SPAWN_FAILURES
                .with_label_values(&[stage.as_str()])
                .inc();
        }
        error!("Job {}: {}", job_id, e);

        pipeline.close().await;
        self.finish(job_id, JobStatus::Failed, 0, Some(e.to_string()));
        OrchestratorError::Spawn(e)
    }

    fn finish(&self, job_id: &str, status: JobStatus, bytes: u64, error: Option<String>) {
        match self.ctx.jobs.finish(job_id, status, bytes, error) {
            Ok(_) => {
                metrics::JOBS_FINISHED
                    .with_label_values(&[status.as_str()])
                    .inc();
            }
            Err(e) => error!("Failed to record {} for job {}: {}", status, job_id, e),
        }
    }
}

/// Terminal status and diagnostic for a finished stream.
///
/// A disconnected client still counts as completed. An upstream failure that
/// happens after bytes were delivered is handled according to `policy`.
pub fn settle(
    outcome: &ForwardOutcome,
    bytes: u64,
    exit: &PipelineExit,
    policy: LateFailurePolicy,
) -> (JobStatus, Option<String>) {
    match outcome {
        ForwardOutcome::SinkClosed(_) => (JobStatus::Completed, None),
        ForwardOutcome::ReadFailed(e) => (
            JobStatus::Failed,
            Some(format!("reading transcoder output failed: {}", e)),
        ),
        ForwardOutcome::DeadlineExceeded => (
            JobStatus::Failed,
            Some("pipeline deadline exceeded".to_string()),
        ),
        ForwardOutcome::EndOfStream if exit.upstream_failed() => {
            let summary = exit.summary();
            if bytes == 0 || policy == LateFailurePolicy::Fail {
                (JobStatus::Failed, Some(summary))
            } else {
                (JobStatus::Completed, Some(summary))
            }
        }
        ForwardOutcome::EndOfStream => (JobStatus::Completed, None),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn exit(authoritative: bool, acquisition: i32, transcode: i32) -> PipelineExit {
        PipelineExit {
            acquisition_exited: authoritative,
            transcode_exited: authoritative,
            acquisition: Some(ExitStatus::from_raw(acquisition << 8)),
            transcode: Some(ExitStatus::from_raw(transcode << 8)),
            acquisition_tail: vec!["ERROR: fragment 12 not found".to_string()],
            transcode_tail: vec![],
        }
    }

    #[test]
    fn test_settle_clean_end() {
        let (status, error) = settle(
            &ForwardOutcome::EndOfStream,
            1000,
            &exit(true, 0, 0),
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Completed);
        assert!(error.is_none());
    }

    #[test]
    fn test_settle_disconnect_is_completed() {
        let (status, error) = settle(
            &ForwardOutcome::SinkClosed(std::io::ErrorKind::BrokenPipe.into()),
            1024,
            &exit(false, 0, 0),
            LateFailurePolicy::Fail,
        );
        assert_eq!(status, JobStatus::Completed);
        assert!(error.is_none());
    }

    #[test]
    fn test_settle_upstream_failure_before_bytes() {
        let (status, error) = settle(
            &ForwardOutcome::EndOfStream,
            0,
            &exit(true, 1, 0),
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Failed);
        assert!(error.unwrap().contains("fragment 12"));
    }

    #[test]
    fn test_settle_late_failure_follows_policy() {
        let late = exit(true, 1, 0);

        let (status, error) = settle(
            &ForwardOutcome::EndOfStream,
            5000,
            &late,
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Completed);
        assert!(error.is_some());

        let (status, _) = settle(&ForwardOutcome::EndOfStream, 5000, &late, LateFailurePolicy::Fail);
        assert_eq!(status, JobStatus::Failed);
    }

    #[test]
    fn test_settle_forwarder_errors_fail() {
        let (status, _) = settle(
            &ForwardOutcome::ReadFailed(std::io::Error::other("boom")),
            10,
            &exit(false, 0, 0),
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Failed);

        let (status, error) = settle(
            &ForwardOutcome::DeadlineExceeded,
            10,
            &exit(false, 0, 0),
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(error.as_deref(), Some("pipeline deadline exceeded"));
    }

    #[test]
    fn test_settle_ignores_non_authoritative_statuses() {
        let (status, _) = settle(
            &ForwardOutcome::EndOfStream,
            10,
            &exit(false, 137, 0),
            LateFailurePolicy::Fail,
        );
        assert_eq!(status, JobStatus::Completed);
    }

    #[test]
    fn test_settle_transcode_failure_with_killed_acquisition() {
        let mut failed = exit(false, 0, 1);
        failed.acquisition = Some(ExitStatus::from_raw(9));
        failed.transcode_exited = true;

        let (status, error) = settle(
            &ForwardOutcome::EndOfStream,
            0,
            &failed,
            LateFailurePolicy::CompletePartial,
        );
        assert_eq!(status, JobStatus::Failed);
        assert!(error.unwrap().contains("transcode"));
    }
}

//! Two-process pipeline: acquisition stdout wired into transcode stdin.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::drain::{spawn_drain, DiagnosticTail};
use super::error::{PipelineError, Stage};

/// How long a drained pipeline's processes get to exit before being killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// How long the acquisition gets to exit once the transcoder has failed.
const FAILED_PEER_GRACE: Duration = Duration::from_millis(500);

/// How long diagnostic drains get to finish once the processes are gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Program and argument vector for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

/// Both halves of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub acquisition: CommandSpec,
    pub transcode: CommandSpec,
}

/// Lifecycle of a [`ProcessPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AcquisitionStarted,
    TranscodeStarted,
    Streaming,
    Drained,
    Closed,
    Faulted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AcquisitionStarted => "acquisition_started",
            Self::TranscodeStarted => "transcode_started",
            Self::Streaming => "streaming",
            Self::Drained => "drained",
            Self::Closed => "closed",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of tearing down a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineExit {
    /// The acquisition exited on its own after the output drained. When false
    /// its status, if any, reflects a forced kill.
    pub acquisition_exited: bool,
    /// Same as `acquisition_exited`, for the transcoder.
    pub transcode_exited: bool,
    pub acquisition: Option<ExitStatus>,
    pub transcode: Option<ExitStatus>,
    pub acquisition_tail: Vec<String>,
    pub transcode_tail: Vec<String>,
}

impl PipelineExit {
    /// Both processes exited on their own after the output drained.
    pub fn authoritative(&self) -> bool {
        self.acquisition_exited && self.transcode_exited
    }

    /// Whether a process that exited on its own reported failure. A peer
    /// killed during teardown does not mask it.
    pub fn upstream_failed(&self) -> bool {
        [
            (self.acquisition_exited, self.acquisition),
            (self.transcode_exited, self.transcode),
        ]
        .iter()
        .any(|(exited, status)| *exited && status.is_some_and(|s| !s.success()))
    }

    /// Short human-readable description of how the processes ended.
    pub fn summary(&self) -> String {
        let describe = |stage: Stage, status: Option<ExitStatus>, tail: &[String]| {
            let mut text = match status {
                Some(s) => format!("{} {}", stage, s),
                None => format!("{} not started", stage),
            };
            if let Some(last) = tail.last() {
                text.push_str(": ");
                text.push_str(last);
            }
            text
        };
        format!(
            "{}; {}",
            describe(Stage::Acquisition, self.acquisition, &self.acquisition_tail),
            describe(Stage::Transcode, self.transcode, &self.transcode_tail)
        )
    }
}

/// An acquisition process piped into a transcode process.
///
/// Drive it with [`start`](Self::start), read [`take_output`](Self::take_output)
/// to end-of-stream, call [`mark_drained`](Self::mark_drained), and always
/// finish with [`close`](Self::close). Dropping the pipeline kills any process
/// that is still running.
pub struct ProcessPipeline {
    job_id: String,
    spec: PipelineSpec,
    state: PipelineState,
    acquisition: Option<Child>,
    transcode: Option<Child>,
    output: Option<ChildStdout>,
    drains: Vec<JoinHandle<()>>,
    acquisition_tail: DiagnosticTail,
    transcode_tail: DiagnosticTail,
}

impl ProcessPipeline {
    pub fn new(job_id: impl Into<String>, spec: PipelineSpec) -> Self {
        Self {
            job_id: job_id.into(),
            spec,
            state: PipelineState::Idle,
            acquisition: None,
            transcode: None,
            output: None,
            drains: Vec::new(),
            acquisition_tail: DiagnosticTail::default(),
            transcode_tail: DiagnosticTail::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Process ids of the running children, acquisition first.
    pub fn pids(&self) -> (Option<u32>, Option<u32>) {
        (
            self.acquisition.as_ref().and_then(Child::id),
            self.transcode.as_ref().and_then(Child::id),
        )
    }

    /// Spawns both processes and wires them together.
    ///
    /// On failure the pipeline is `Faulted` and no process is left running.
    pub async fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::InvalidState {
                action: "start",
                state: self.state,
            });
        }

        let mut acquisition_cmd = self.spec.acquisition.command();
        acquisition_cmd.stdin(Stdio::null());
        let spawned = acquisition_cmd.spawn();
        drop(acquisition_cmd);

        let mut acquisition = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.state = PipelineState::Faulted;
                return Err(PipelineError::spawn(
                    Stage::Acquisition,
                    self.spec.acquisition.display_program(),
                    e,
                ));
            }
        };
        self.state = PipelineState::AcquisitionStarted;
        debug!(job_id = %self.job_id, pid = ?acquisition.id(), "Acquisition process started");

        if let Some(stderr) = acquisition.stderr.take() {
            self.drains.push(spawn_drain(
                self.job_id.clone(),
                Stage::Acquisition,
                stderr,
                self.acquisition_tail.clone(),
            ));
        }
        let acquisition_stdout = acquisition.stdout.take();
        self.acquisition = Some(acquisition);

        let stdin: std::io::Result<Stdio> = match acquisition_stdout {
            Some(stdout) => stdout.try_into(),
            None => Err(std::io::Error::other("acquisition stdout was not captured")),
        };
        let stdin = match stdin {
            Ok(stdin) => stdin,
            Err(e) => return Err(self.fault(e.into()).await),
        };

        let mut transcode_cmd = self.spec.transcode.command();
        transcode_cmd.stdin(stdin);
        let spawned = transcode_cmd.spawn();
        drop(transcode_cmd);

        let mut transcode = match spawned {
            Ok(child) => child,
            Err(e) => {
                let err = PipelineError::spawn(
                    Stage::Transcode,
                    self.spec.transcode.display_program(),
                    e,
                );
                return Err(self.fault(err).await);
            }
        };
        self.state = PipelineState::TranscodeStarted;
        debug!(job_id = %self.job_id, pid = ?transcode.id(), "Transcode process started");

        if let Some(stderr) = transcode.stderr.take() {
            self.drains.push(spawn_drain(
                self.job_id.clone(),
                Stage::Transcode,
                stderr,
                self.transcode_tail.clone(),
            ));
        }
        self.output = transcode.stdout.take();
        self.transcode = Some(transcode);

        self.state = PipelineState::Streaming;
        info!(job_id = %self.job_id, "Pipeline streaming");
        Ok(())
    }

    /// Hands out the transcode stdout. Only available once, while streaming.
    pub fn take_output(&mut self) -> Result<ChildStdout, PipelineError> {
        match (self.state, self.output.take()) {
            (PipelineState::Streaming, Some(output)) => Ok(output),
            (state, _) => Err(PipelineError::InvalidState {
                action: "take output from",
                state,
            }),
        }
    }

    /// Records that the output was read to end-of-stream.
    pub fn mark_drained(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Streaming {
            return Err(PipelineError::InvalidState {
                action: "drain",
                state: self.state,
            });
        }
        self.state = PipelineState::Drained;
        Ok(())
    }

    /// Tears the pipeline down and reaps both processes.
    ///
    /// A drained pipeline is waited on; in any other state the processes are
    /// killed first. Safe to call in every state, including after a fault.
    pub async fn close(&mut self) -> PipelineExit {
        self.output = None;

        let ((transcode, transcode_exited), (acquisition, acquisition_exited)) =
            if self.state == PipelineState::Drained {
                let transcode = wait_graceful(
                    &self.job_id,
                    Stage::Transcode,
                    &mut self.transcode,
                    EXIT_GRACE,
                )
                .await;
                // A failed transcoder no longer reads; the acquisition only
                // notices on its next write.
                let grace = match transcode {
                    (Some(status), true) if !status.success() => FAILED_PEER_GRACE,
                    _ => EXIT_GRACE,
                };
                let acquisition =
                    wait_graceful(&self.job_id, Stage::Acquisition, &mut self.acquisition, grace)
                        .await;
                (transcode, acquisition)
            } else {
                (
                    (
                        kill_and_wait(&self.job_id, Stage::Transcode, &mut self.transcode).await,
                        false,
                    ),
                    (
                        kill_and_wait(&self.job_id, Stage::Acquisition, &mut self.acquisition)
                            .await,
                        false,
                    ),
                )
            };

        self.join_drains().await;

        if self.state != PipelineState::Faulted {
            self.state = PipelineState::Closed;
        }

        let exit = PipelineExit {
            acquisition_exited,
            transcode_exited,
            acquisition,
            transcode,
            acquisition_tail: self.acquisition_tail.snapshot(),
            transcode_tail: self.transcode_tail.snapshot(),
        };
        debug!(
            job_id = %self.job_id,
            acquisition_exited,
            transcode_exited,
            "Pipeline closed"
        );
        exit
    }

    async fn fault(&mut self, err: PipelineError) -> PipelineError {
        warn!(job_id = %self.job_id, error = %err, "Pipeline setup failed");
        self.state = PipelineState::Faulted;
        kill_and_wait(&self.job_id, Stage::Acquisition, &mut self.acquisition).await;
        err
    }

    async fn join_drains(&mut self) {
        let deadline = Instant::now() + DRAIN_GRACE;
        for mut handle in self.drains.drain(..) {
            if timeout_at(deadline, &mut handle).await.is_err() {
                debug!(job_id = %self.job_id, "Diagnostic drain did not finish in time, aborting");
                handle.abort();
            }
        }
    }
}

impl Drop for ProcessPipeline {
    fn drop(&mut self) {
        for child in [self.acquisition.as_mut(), self.transcode.as_mut()]
            .into_iter()
            .flatten()
        {
            let _ = child.start_kill();
        }
        for handle in &self.drains {
            handle.abort();
        }
    }
}

/// Waits for a child to exit on its own. Returns the status and whether it
/// exited without being killed.
async fn wait_graceful(
    job_id: &str,
    stage: Stage,
    slot: &mut Option<Child>,
    grace: Duration,
) -> (Option<ExitStatus>, bool) {
    let Some(child) = slot.as_mut() else {
        return (None, true);
    };

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            slot.take();
            debug!(job_id, stage = %stage, %status, "Process exited");
            (Some(status), true)
        }
        Ok(Err(e)) => {
            warn!(job_id, stage = %stage, error = %e, "Failed to wait for process");
            (kill_and_wait(job_id, stage, slot).await, false)
        }
        Err(_) => {
            warn!(job_id, stage = %stage, ?grace, "Process did not exit after output drained, killing");
            (kill_and_wait(job_id, stage, slot).await, false)
        }
    }
}

async fn kill_and_wait(job_id: &str, stage: Stage, slot: &mut Option<Child>) -> Option<ExitStatus> {
    let mut child = slot.take()?;
    if let Err(e) = child.start_kill() {
        debug!(job_id, stage = %stage, error = %e, "Kill failed, process may have exited");
    }
    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(job_id, stage = %stage, error = %e, "Failed to reap process");
            None
        }
    }
}

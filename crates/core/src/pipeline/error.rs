//! Error types for the pipeline module.

use std::fmt;
use thiserror::Error;

use super::process::PipelineState;

/// Which of the two chained processes an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The media acquisition tool (producer).
    Acquisition,
    /// The transcoding tool (consumer of the acquisition output).
    Transcode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Transcode => "transcode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while setting up or driving a process pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A process could not be started.
    #[error("Failed to spawn {stage} process '{program}': {source}")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation not allowed in the current state.
    #[error("Cannot {action} pipeline in state {state}")]
    InvalidState {
        action: &'static str,
        state: PipelineState,
    },

    /// Wiring the processes together failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn spawn(stage: Stage, program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            stage,
            program: program.into(),
            source,
        }
    }

    /// Stage that failed to spawn, if this is a spawn error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Spawn { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

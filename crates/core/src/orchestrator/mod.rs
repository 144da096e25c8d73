//! Stream orchestrator.
//!
//! Owns the lifecycle of a job: it records the job, starts the two-process
//! pipeline, forwards the output into a caller-supplied sink and always leaves
//! the job in a terminal ledger status.
//!
//! # Example
//!
//! ```ignore
//! use tubepipe_core::orchestrator::{CreateJob, StreamContext, StreamOrchestrator};
//! use tubepipe_core::MediaKind;
//!
//! let orchestrator = StreamOrchestrator::new(StreamContext::new(&config, jobs));
//! let job = orchestrator
//!     .create_job(CreateJob::new("https://www.youtube.com/watch?v=abc", MediaKind::Audio))
//!     .await?;
//!
//! let stream = orchestrator.open_stream(&job.id).await?;
//! println!("{}", stream.content_disposition());
//! let outcome = orchestrator.run_stream(stream, tokio::io::sink()).await;
//! ```

mod runner;
mod types;

pub use crate::config::LateFailurePolicy;
pub use runner::{settle, StreamContext, StreamOrchestrator};
pub use types::{ActiveStream, CreateJob, OrchestratorError, StreamOutcome, ABANDONED_ERROR};

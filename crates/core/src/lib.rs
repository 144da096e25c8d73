pub mod args;
pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod testing;
pub mod title;

pub use config::{
    load_config, load_config_from_str, validate_config, verify_tools, Config, ConfigError,
    LateFailurePolicy,
};
pub use job::{
    CreateJobRequest, Job, JobError, JobFilter, JobStatus, JobStore, MediaKind, SqliteJobStore,
};
pub use orchestrator::{
    ActiveStream, CreateJob, OrchestratorError, StreamContext, StreamOrchestrator, StreamOutcome,
};
pub use pipeline::{BufferPool, PipelineError, Stage};
pub use title::{CommandTitleResolver, TitleResolver};

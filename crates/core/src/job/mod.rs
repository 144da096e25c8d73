//! Job ledger: persistent record of every stream request and its lifecycle.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{CreateJobRequest, JobError, JobFilter, JobStore};
pub use types::{Job, JobStatus, MediaKind};

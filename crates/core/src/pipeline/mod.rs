//! Process pipeline: acquisition tool piped into a transcoder, with the
//! transcoder output forwarded to a caller-supplied sink.

mod drain;
mod error;
mod forward;
mod pool;
mod process;

pub use drain::{DiagnosticTail, TAIL_LINES};
pub use error::{PipelineError, Stage};
pub use forward::{forward, ForwardOptions, ForwardOutcome, ForwardReport};
pub use pool::{BufferPool, PooledBuffer};
pub use process::{CommandSpec, PipelineExit, PipelineSpec, PipelineState, ProcessPipeline};

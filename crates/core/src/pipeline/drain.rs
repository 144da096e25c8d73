//! Background draining of a child process's stderr.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::Stage;

/// Number of diagnostic lines kept per process for failure messages.
pub const TAIL_LINES: usize = 20;

/// Markers of high-frequency progress lines that are not worth logging.
const PROGRESS_MARKERS: &[&str] = &["frame=", "size=", "speed="];

/// Records longer than this are cut, so output that never delimits stays bounded.
const MAX_RECORD_BYTES: usize = 8 * 1024;

/// Bounded ring of the most recent diagnostic lines.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticTail {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl DiagnosticTail {
    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        if lines.len() == TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Copy of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

pub(crate) fn is_progress_line(line: &str) -> bool {
    PROGRESS_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Reads the next record ended by `\n` or `\r` into `record`.
///
/// Tools redraw progress with bare carriage returns, so either byte ends a
/// record. Returns `false` at EOF with nothing pending.
async fn next_record<R>(reader: &mut R, record: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    record.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(!record.is_empty());
        }

        let room = MAX_RECORD_BYTES - record.len();
        let window = &available[..available.len().min(room)];
        if let Some(end) = window.iter().position(|b| matches!(b, b'\n' | b'\r')) {
            record.extend_from_slice(&window[..end]);
            reader.consume(end + 1);
            return Ok(true);
        }

        let taken = window.len();
        record.extend_from_slice(window);
        reader.consume(taken);
        if record.len() >= MAX_RECORD_BYTES {
            return Ok(true);
        }
    }
}

/// Spawns a task that reads `reader` to EOF, logging non-progress lines.
pub(crate) fn spawn_drain<R>(
    job_id: String,
    stage: Stage,
    reader: R,
    tail: DiagnosticTail,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut record = Vec::with_capacity(256);

        loop {
            match next_record(&mut reader, &mut record).await {
                Ok(false) => break,
                Ok(true) => {
                    let line = String::from_utf8_lossy(&record);
                    let line = line.trim();
                    if line.is_empty() || is_progress_line(line) {
                        continue;
                    }
                    info!(job_id = %job_id, stage = %stage, "{}", line);
                    tail.push(line.to_string());
                }
                Err(e) => {
                    debug!(job_id = %job_id, stage = %stage, error = %e, "Diagnostic stream read failed");
                    break;
                }
            }
        }

        debug!(job_id = %job_id, stage = %stage, "Diagnostic stream closed");
    })
}

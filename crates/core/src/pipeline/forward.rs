//! Copies pipeline output into a response sink.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

use super::pool::BufferPool;
use crate::config::StreamingConfig;

/// Tuning for a single [`forward`] call.
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    /// Flush the sink after at least this many bytes since the last flush.
    pub flush_interval: usize,
    /// Give up once this instant passes.
    pub deadline: Option<Instant>,
    /// Running count of bytes accepted by the sink, readable while forwarding.
    pub progress: Option<Arc<AtomicU64>>,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            flush_interval: 512 * 1024,
            deadline: None,
            progress: None,
        }
    }
}

impl ForwardOptions {
    /// Options from config, with any deadline counted from `started_at`.
    pub fn from_config(config: &StreamingConfig, started_at: Instant) -> Self {
        Self {
            flush_interval: config.flush_interval_bytes.max(1),
            deadline: config
                .pipeline_timeout_secs
                .map(|secs| started_at + Duration::from_secs(secs)),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<AtomicU64>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// How forwarding ended.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// The source reached end-of-stream and everything was flushed.
    EndOfStream,
    /// The sink rejected a write or flush, typically a disconnected client.
    SinkClosed(io::Error),
    /// Reading from the source failed.
    ReadFailed(io::Error),
    /// The deadline passed before the source finished.
    DeadlineExceeded,
}

impl ForwardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndOfStream => "end_of_stream",
            Self::SinkClosed(_) => "sink_closed",
            Self::ReadFailed(_) => "read_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for ForwardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinkClosed(e) | Self::ReadFailed(e) => write!(f, "{}: {}", self.as_str(), e),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Byte count and termination cause of a [`forward`] call.
#[derive(Debug)]
pub struct ForwardReport {
    /// Bytes accepted by the sink.
    pub bytes: u64,
    pub outcome: ForwardOutcome,
}

/// Streams `reader` into `sink` using a buffer borrowed from `pool`.
///
/// Every chunk is written as soon as it is read. Never returns an error;
/// the outcome describes why forwarding stopped.
pub async fn forward<R, W>(
    mut reader: R,
    mut sink: W,
    pool: &BufferPool,
    options: &ForwardOptions,
) -> ForwardReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = pool.acquire();
    let mut bytes = 0u64;
    let mut unflushed = 0usize;

    let outcome = loop {
        let read = match options.deadline {
            Some(deadline) => match timeout_at(deadline, reader.read(&mut buf[..])).await {
                Ok(read) => read,
                Err(_) => break ForwardOutcome::DeadlineExceeded,
            },
            None => reader.read(&mut buf[..]).await,
        };

        let n = match read {
            Ok(0) => match sink.flush().await {
                Ok(()) => break ForwardOutcome::EndOfStream,
                Err(e) => break ForwardOutcome::SinkClosed(e),
            },
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break ForwardOutcome::ReadFailed(e),
        };

        if let Err(e) = sink.write_all(&buf[..n]).await {
            break ForwardOutcome::SinkClosed(e);
        }
        bytes += n as u64;
        unflushed += n;
        if let Some(progress) = &options.progress {
            progress.fetch_add(n as u64, Ordering::Relaxed);
        }

        if unflushed >= options.flush_interval {
            if let Err(e) = sink.flush().await {
                break ForwardOutcome::SinkClosed(e);
            }
            unflushed = 0;
        }
    };

    ForwardReport { bytes, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Sink that accepts `limit` bytes, then fails like a closed socket.
    struct LimitedSink {
        accepted: Vec<u8>,
        limit: usize,
        flushes: usize,
    }

    impl LimitedSink {
        fn new(limit: usize) -> Self {
            Self {
                accepted: Vec::new(),
                limit,
                flushes: 0,
            }
        }
    }

    impl AsyncWrite for LimitedSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            data: &[u8],
        ) -> Poll<io::Result<usize>> {
            let room = self.limit - self.accepted.len();
            if room == 0 {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            let n = room.min(data.len());
            self.accepted.extend_from_slice(&data[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Source that yields some bytes and then errors.
    struct FailingReader {
        remaining: usize,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.remaining == 0 {
                return Poll::Ready(Err(io::Error::other("pipe broke")));
            }
            let n = self.remaining.min(buf.remaining());
            buf.put_slice(&vec![7u8; n]);
            self.remaining -= n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_forwards_everything() {
        let pool = BufferPool::new(1024, 2);
        let data = vec![42u8; 10_000];
        let mut sink = Vec::new();

        let report = forward(&data[..], &mut sink, &pool, &ForwardOptions::default()).await;

        assert!(matches!(report.outcome, ForwardOutcome::EndOfStream));
        assert_eq!(report.bytes, 10_000);
        assert_eq!(sink, data);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let pool = BufferPool::new(64, 2);
        let mut sink = Vec::new();
        let report = forward(&b""[..], &mut sink, &pool, &ForwardOptions::default()).await;
        assert!(matches!(report.outcome, ForwardOutcome::EndOfStream));
        assert_eq!(report.bytes, 0);
    }

    #[tokio::test]
    async fn test_sink_closed_reports_partial_bytes() {
        let pool = BufferPool::new(256, 2);
        let data = vec![1u8; 4096];
        let mut sink = LimitedSink::new(1000);

        let report = forward(&data[..], &mut sink, &pool, &ForwardOptions::default()).await;

        assert!(matches!(report.outcome, ForwardOutcome::SinkClosed(_)));
        assert_eq!(report.bytes, 768);
        assert_eq!(sink.accepted.len(), 1000);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_progress_tracks_accepted_bytes() {
        let pool = BufferPool::new(256, 2);
        let data = vec![1u8; 4096];
        let mut sink = LimitedSink::new(1000);
        let progress = Arc::new(AtomicU64::new(0));
        let options = ForwardOptions::default().with_progress(progress.clone());

        let report = forward(&data[..], &mut sink, &pool, &options).await;

        assert_eq!(progress.load(Ordering::Relaxed), report.bytes);
        assert_eq!(report.bytes, 768);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let pool = BufferPool::new(128, 2);
        let mut sink = Vec::new();
        let report = forward(
            FailingReader { remaining: 300 },
            &mut sink,
            &pool,
            &ForwardOptions::default(),
        )
        .await;

        assert!(matches!(report.outcome, ForwardOutcome::ReadFailed(_)));
        assert_eq!(report.bytes, 300);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_flush_cadence() {
        let pool = BufferPool::new(100, 2);
        let data = vec![0u8; 1000];
        let mut sink = LimitedSink::new(usize::MAX);
        let options = ForwardOptions {
            flush_interval: 250,
            ..Default::default()
        };

        let report = forward(&data[..], &mut sink, &pool, &options).await;

        assert_eq!(report.bytes, 1000);
        // Three interval flushes (300, 600, 900 bytes) plus the final one.
        assert_eq!(sink.flushes, 4);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let pool = BufferPool::new(64, 2);
        let (_writer, reader) = tokio::io::duplex(64);
        let mut sink = Vec::new();
        let options = ForwardOptions {
            flush_interval: 64,
            deadline: Some(Instant::now() + Duration::from_millis(50)),
            ..Default::default()
        };

        let report = forward(reader, &mut sink, &pool, &options).await;

        assert!(matches!(report.outcome, ForwardOutcome::DeadlineExceeded));
        assert_eq!(report.bytes, 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = StreamingConfig {
            pipeline_timeout_secs: Some(60),
            flush_interval_bytes: 4096,
            ..Default::default()
        };
        let start = Instant::now();
        let options = ForwardOptions::from_config(&config, start);
        assert_eq!(options.flush_interval, 4096);
        assert_eq!(options.deadline, Some(start + Duration::from_secs(60)));

        let options = ForwardOptions::from_config(&StreamingConfig::default(), start);
        assert!(options.deadline.is_none());
    }
}

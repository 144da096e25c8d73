//! Shared pool of fixed-size transfer buffers.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::config::StreamingConfig;

/// Pool of reusable byte buffers shared by all concurrent streams.
///
/// Buffers are handed out behind a [`PooledBuffer`] guard and go back to the
/// pool when the guard is dropped. At most `max_idle` buffers are retained.
#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    max_idle: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            max_idle,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(config.buffer_size, config.pool_max_idle)
    }

    /// Size of every buffer handed out by this pool.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    /// Borrows a buffer, allocating a fresh one if the pool is empty.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size]);
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.len() != self.buffer_size {
            return;
        }
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        // A panic while holding the lock cannot leave the Vec inconsistent.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A buffer borrowed from a [`BufferPool`].
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

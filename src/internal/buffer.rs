//! Size-bucketed pool of reusable byte buffers.
//!
//! Pack and loose readers allocate many short-lived, identically sized
//! preload buffers; the pool recycles them instead. Buffers are bucketed by
//! `len % BUCKETS` and a bucket keeps at most [`SLOTS_PER_BUCKET`] buffers.
//! Take and release never block: a contended bucket simply falls back to
//! plain allocation, so a buffer is at worst dropped, never corrupted.
//! The pool never shrinks and is owned by the object store, not a process
//! global, so tests can isolate pools.

use std::sync::{Arc, Mutex};

/// Prime bucket count keeps common preload sizes from colliding.
const BUCKETS: usize = 13;
/// Per-bucket retention ceiling; beyond it released buffers are discarded.
const SLOTS_PER_BUCKET: usize = 32;

/// A pool of reusable byte buffers, bucketed by requested length.
pub struct BufferPool {
    buckets: Vec<Mutex<Vec<Vec<u8>>>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            buckets: (0..BUCKETS).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Take a zero-initialised buffer of exactly `len` bytes.
    ///
    /// Serves a recycled same-size buffer when the bucket has one and is
    /// uncontended, otherwise allocates.
    pub fn take(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let bucket = &self.buckets[len % BUCKETS];
        if let Ok(mut slots) = bucket.try_lock()
            && let Some(pos) = slots.iter().position(|b| b.len() == len)
        {
            let buf = slots.swap_remove(pos);
            return PooledBuffer {
                pool: Some(Arc::clone(self)),
                buf,
            };
        }
        PooledBuffer {
            pool: Some(Arc::clone(self)),
            buf: vec![0u8; len],
        }
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.is_empty() {
            return;
        }
        let bucket = &self.buckets[buf.len() % BUCKETS];
        if let Ok(mut slots) = bucket.try_lock()
            && slots.len() < SLOTS_PER_BUCKET
        {
            buf.iter_mut().for_each(|b| *b = 0);
            slots.push(buf);
        }
        // Contended or full bucket: the buffer is simply dropped.
    }
}

/// A scoped buffer handle; dropping it returns the buffer to its pool.
pub struct PooledBuffer {
    pool: Option<Arc<BufferPool>>,
    buf: Vec<u8>,
}

impl PooledBuffer {
    /// Transfer ownership out of the scope; the buffer will not be released
    /// back to the pool.
    pub fn detach(mut self) -> Vec<u8> {
        self.pool = None;
        std::mem::take(&mut self.buf)
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.buf));
        }
    }
}

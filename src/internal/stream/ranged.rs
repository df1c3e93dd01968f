//! Length-limited view over a parent stream.

use std::io::{self, Read};

/// Reads from a parent stream, limited to `limit` bytes.
pub struct RangedStream<R> {
    inner: R,
    limit: u64,
    remaining: u64,
}

impl<R: Read> RangedStream<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        RangedStream {
            inner,
            limit,
            remaining: limit,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.limit - self.remaining
    }
}

impl<R: Read> Read for RangedStream<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = out.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut out[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

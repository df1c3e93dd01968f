//! Reference-counted handle over one seekable stream.

use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::{Arc, Mutex},
};

/// A cloneable handle over a shared seekable stream.
///
/// All handles of a group share one underlying stream behind a mutex; each
/// handle keeps its own virtual position and re-seeks the stream before
/// every read under the lock. The underlying descriptor is released when the
/// last handle is dropped. This is the stream type held by the object-stream
/// cache.
pub struct SharedStream {
    inner: Arc<Mutex<Box<dyn super::SeekableStream>>>,
    pos: u64,
}

impl SharedStream {
    pub fn new(stream: impl super::SeekableStream + 'static) -> Self {
        SharedStream {
            inner: Arc::new(Mutex::new(Box::new(stream))),
            pos: 0,
        }
    }

    /// A fresh handle over the same underlying stream, positioned at 0.
    pub fn reopen(&self) -> SharedStream {
        SharedStream {
            inner: Arc::clone(&self.inner),
            pos: 0,
        }
    }

    /// Number of live handles in this share group.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(
        &self,
    ) -> io::Result<std::sync::MutexGuard<'_, Box<dyn super::SeekableStream>>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("shared stream group poisoned"))
    }
}

impl Clone for SharedStream {
    fn clone(&self) -> Self {
        SharedStream {
            inner: Arc::clone(&self.inner),
            pos: self.pos,
        }
    }
}

impl Read for SharedStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.lock()?;
        guard.seek(SeekFrom::Start(self.pos))?;
        let n = guard.read(out)?;
        drop(guard);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SharedStream {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        let target = match to {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => {
                let mut guard = self.lock()?;
                let len = guard.seek(SeekFrom::End(0))?;
                len as i128 + d as i128
            }
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

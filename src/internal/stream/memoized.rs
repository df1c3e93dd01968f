//! Seekable replay buffer over a forward-only source.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
};

/// Bytes of expected payload below which the replay buffer stays in memory.
const SPILL_THRESHOLD: u64 = 1024 * 1024;

/// How much to pull from the source per fault-in step.
const PULL_CHUNK: usize = 8 * 1024;

enum Backing {
    Memory(Vec<u8>),
    File(File),
}

/// Seekable wrapper over a forward-only source.
///
/// Bytes read from the source are retained, in memory when the expected
/// total size is under 1 MiB and in an anonymous temporary file otherwise,
/// so any already-produced range can be re-read. Seeks past the retained
/// range pull the gap from the source on demand. This is what lets an
/// arbitrarily nested delta base be consumed more than once.
pub struct MemoizedStream<R> {
    source: Option<R>,
    backing: Backing,
    spill: bool,
    cached: u64,
    pos: u64,
}

impl<R: Read> MemoizedStream<R> {
    /// Wrap `source`, expected to produce `expected_len` bytes in total.
    ///
    /// The expectation only selects the backing store; a source that
    /// produces more or fewer bytes still works.
    pub fn new(source: R, expected_len: u64) -> Self {
        let spill = expected_len >= SPILL_THRESHOLD;
        MemoizedStream {
            source: Some(source),
            backing: Backing::Memory(Vec::with_capacity(if spill {
                0
            } else {
                expected_len as usize
            })),
            spill,
            cached: 0,
            pos: 0,
        }
    }

    /// Total bytes retained so far.
    pub fn cached_len(&self) -> u64 {
        self.cached
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if self.spill && matches!(self.backing, Backing::Memory(_)) {
            // First write of a large stream: switch to a temp file.
            let mut file = tempfile::tempfile()?;
            if let Backing::Memory(existing) = &self.backing {
                file.write_all(existing)?;
            }
            self.backing = Backing::File(file);
        }
        match &mut self.backing {
            Backing::Memory(vec) => vec.extend_from_slice(data),
            Backing::File(file) => {
                file.seek(SeekFrom::End(0))?;
                file.write_all(data)?;
            }
        }
        self.cached += data.len() as u64;
        Ok(())
    }

    /// Pull from the source until at least `upto` bytes are retained or the
    /// source is exhausted.
    fn ensure(&mut self, upto: u64) -> io::Result<()> {
        let mut chunk = [0u8; PULL_CHUNK];
        while self.cached < upto {
            let Some(source) = self.source.as_mut() else {
                return Ok(());
            };
            let n = source.read(&mut chunk)?;
            if n == 0 {
                self.source = None;
                return Ok(());
            }
            self.append(&chunk[..n])?;
        }
        Ok(())
    }

    fn ensure_all(&mut self) -> io::Result<()> {
        self.ensure(u64::MAX)
    }

    fn read_at(&mut self, pos: u64, out: &mut [u8]) -> io::Result<usize> {
        match &mut self.backing {
            Backing::Memory(vec) => {
                let start = pos.min(vec.len() as u64) as usize;
                let n = out.len().min(vec.len() - start);
                out[..n].copy_from_slice(&vec[start..start + n]);
                Ok(n)
            }
            Backing::File(file) => {
                file.seek(SeekFrom::Start(pos))?;
                file.read(out)
            }
        }
    }
}

impl<R: Read> Read for MemoizedStream<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.ensure(self.pos + out.len() as u64)?;
        if self.pos >= self.cached {
            return Ok(0);
        }
        let n = self.read_at(self.pos, out)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> Seek for MemoizedStream<R> {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        let target = match to {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => {
                self.ensure_all()?;
                self.cached as i128 + d as i128
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

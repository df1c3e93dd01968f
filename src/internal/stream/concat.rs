//! Sequential concatenation of streams.

use std::{
    collections::VecDeque,
    io::{self, Read},
};

/// Reads an ordered list of streams back to back.
///
/// Each inner stream is dropped as soon as it reports EOF, so descriptors
/// held by later streams in the chain outlive earlier ones only as long as
/// necessary. I/O errors from the active stream propagate unchanged.
pub struct ConcatStream {
    streams: VecDeque<Box<dyn Read + Send>>,
}

impl ConcatStream {
    pub fn new(streams: Vec<Box<dyn Read + Send>>) -> Self {
        ConcatStream {
            streams: streams.into(),
        }
    }
}

impl Read for ConcatStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while let Some(front) = self.streams.front_mut() {
            let n = front.read(out)?;
            if n > 0 {
                return Ok(n);
            }
            // EOF on the active stream: dispose it and move on.
            self.streams.pop_front();
        }
        Ok(0)
    }
}

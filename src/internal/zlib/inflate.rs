//! Lazy inflate view over a compressed prefix of a stream.
//!
//! Loose objects and pack entries embed zlib frames whose compressed length
//! is not known up front; this reader consumes exactly the compressed prefix
//! it needs from the parent (leaving trailing bytes unread) and produces the
//! uncompressed bytes on demand.

use std::{io, io::BufRead};

use flate2::{Decompress, FlushDecompress, Status};

/// Decompressing reader over the zlib frame at the parent's current
/// position.
///
/// For a continuous stream of DEFLATE information, the reader never consumes
/// bytes beyond the frame it decodes, so subsequent reads from the parent
/// resume right after the compressed data. The inflate context is released
/// as soon as the decompressed stream ends.
pub struct InflateReader<R> {
    /// The reader from which bytes should be decompressed.
    inner: R,
    /// The decompressor doing all the work; dropped at stream end.
    state: Option<Box<Decompress>>,
}

impl<R> InflateReader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        InflateReader {
            inner,
            state: Some(Box::new(Decompress::new(true))),
        }
    }

    /// Total compressed bytes consumed from the parent so far.
    pub fn compressed_in(&self) -> u64 {
        self.state.as_ref().map(|s| s.total_in()).unwrap_or(0)
    }

    /// Recover the parent reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> io::Read for InflateReader<R>
where
    R: BufRead,
{
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let Some(state) = self.state.as_mut() else {
            return Ok(0);
        };
        let (n, ended) = read(&mut self.inner, state, into)?;
        if ended {
            self.state = None;
        }
        Ok(n)
    }
}

/// Read bytes from `rd` and decompress them using `state` into a
/// pre-allocated fitting buffer `dst`, returning the amount of bytes written
/// and whether the deflate stream ended.
fn read(
    rd: &mut impl BufRead,
    state: &mut Decompress,
    mut dst: &mut [u8],
) -> io::Result<(usize, bool)> {
    let mut total_written = 0;
    loop {
        let (written, consumed, ret, eof);
        {
            let input = rd.fill_buf()?;
            eof = input.is_empty();
            let before_out = state.total_out();
            let before_in = state.total_in();
            let flush = if eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            ret = state.decompress(input, dst, flush);
            written = (state.total_out() - before_out) as usize;
            total_written += written;
            dst = &mut dst[written..];
            consumed = (state.total_in() - before_in) as usize;
        }
        rd.consume(consumed);

        match ret {
            // The stream has officially ended, nothing more to do here.
            Ok(Status::StreamEnd) => return Ok((total_written, true)),
            // Either input or output is depleted even though the stream is not depleted yet.
            Ok(Status::Ok | Status::BufError) if eof || dst.is_empty() => {
                return Ok((total_written, false));
            }
            // Some progress was made in both the input and the output, it must continue to reach the end.
            Ok(Status::Ok | Status::BufError) if consumed != 0 || written != 0 => continue,
            // A strange state, where zlib makes no progress but isn't done either. Call it out.
            Ok(Status::Ok | Status::BufError) => unreachable!("Definitely a bug somewhere"),
            Err(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "corrupt deflate stream",
                ));
            }
        }
    }
}

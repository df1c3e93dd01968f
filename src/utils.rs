//! Shared I/O utilities: small exact-read helpers and a byte-counting reader
//! used to track stream progress across the pack and index parsers.

use std::{
    io,
    io::{BufRead, Read},
};

use crate::hash::ObjectHash;

/// Read exactly `len` bytes into a fresh buffer.
pub fn read_bytes(file: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a 20-byte object id.
pub fn read_sha(file: &mut impl Read) -> io::Result<ObjectHash> {
    ObjectHash::from_stream(file)
}

/// A lightweight wrapper that counts bytes read from the underlying reader.
///
/// The pack entry reader needs to know how far the compressed frame reached
/// so the next entry offset can be validated; `flate2` only reports totals
/// per decompress state, not per underlying reader.
pub struct CountingReader<R> {
    pub inner: R,
    pub bytes_read: u64,
}

impl<R> CountingReader<R> {
    /// Creates a new `CountingReader` wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.bytes_read += amt as u64;
        self.inner.consume(amt);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::{CountingReader, read_bytes};

    #[test]
    fn test_read_bytes_exact() {
        let mut cur = Cursor::new(b"abcdef".to_vec());
        assert_eq!(read_bytes(&mut cur, 4).unwrap(), b"abcd");
        assert_eq!(read_bytes(&mut cur, 2).unwrap(), b"ef");
        assert!(read_bytes(&mut cur, 1).is_err());
    }

    #[test]
    fn test_counting_reader_tracks_progress() {
        let mut reader = CountingReader::new(Cursor::new(vec![0u8; 100]));
        let mut buf = [0u8; 64];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.bytes_read, 64);
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(reader.bytes_read, 64 + n as u64);
    }
}

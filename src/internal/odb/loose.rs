//! Reader for loose object files.
//!
//! A loose object lives at `objects/<hex[0..2]>/<hex[2..]>` as one zlib
//! frame whose plaintext is `"<type> <size>\0"` followed by the body. The
//! header is pulled through a small preload buffer; whatever body bytes
//! arrived with it are stitched back in front of the still-lazy inflate
//! stream.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::{
        buffer::BufferPool,
        object::types::ObjectType,
        stream::{ConcatStream, PreloadStream, RangedStream},
        zlib::InflateReader,
    },
};

/// Largest possible `"<type> <size>\0"` prefix plus change.
const HEADER_PRELOAD: usize = 64;

/// Filesystem location of a loose object.
pub fn loose_object_path(git_dir: &Path, hash: &ObjectHash) -> PathBuf {
    let hex = hash.to_string();
    git_dir
        .join("objects")
        .join(&hex[0..2])
        .join(&hex[2..])
}

/// A loose object opened for reading: its type, declared size, and lazy
/// body stream of exactly that many bytes.
pub struct LooseObject {
    pub kind: ObjectType,
    pub size: u64,
    pub body: Box<dyn Read + Send>,
}

/// Open the loose object for `hash`, or `None` when no loose file exists.
pub fn read_loose_object(
    git_dir: &Path,
    hash: &ObjectHash,
    buffers: &Arc<BufferPool>,
) -> Result<Option<LooseObject>, GitError> {
    let path = loose_object_path(git_dir, hash);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::IOError(e)),
    };

    let mut inflate = InflateReader::new(BufReader::new(file));

    let mut preload = buffers.take(HEADER_PRELOAD);
    let filled = read_full(&mut inflate, &mut preload)?;
    let nul = memchr::memchr(0, &preload[..filled]).ok_or_else(|| {
        GitError::InvalidLooseObject(format!("{}: header NUL not found", path.display()))
    })?;

    let (kind, size) = parse_header(&preload[..nul], &path)?;

    // Body bytes that rode along with the header preload.
    let tail = preload[nul + 1..filled].to_vec();
    let body = RangedStream::new(
        ConcatStream::new(vec![
            Box::new(PreloadStream::from_vec(tail)),
            Box::new(inflate),
        ]),
        size,
    );

    Ok(Some(LooseObject {
        kind,
        size,
        body: Box::new(body),
    }))
}

/// Parse `"<type> <size>"` (ASCII, already NUL-stripped).
fn parse_header(header: &[u8], path: &Path) -> Result<(ObjectType, u64), GitError> {
    let text = std::str::from_utf8(header).map_err(|_| {
        GitError::InvalidLooseObject(format!("{}: non-ASCII header", path.display()))
    })?;
    let (kind_str, size_str) = text.split_once(' ').ok_or_else(|| {
        GitError::InvalidLooseObject(format!("{}: header missing size", path.display()))
    })?;
    let kind = ObjectType::from_string(kind_str)?;
    let size: u64 = size_str.parse().map_err(|_| {
        GitError::InvalidLooseObject(format!("{}: bad size `{size_str}`", path.display()))
    })?;
    if size > i64::MAX as u64 {
        return Err(GitError::InvalidLooseObject(format!(
            "{}: size {size} exceeds signed 64-bit range",
            path.display()
        )));
    }
    Ok((kind, size))
}

/// Fill `buf` as far as the reader allows; EOF short-stops.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, GitError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io::{Read, Write},
        path::Path,
        sync::Arc,
    };

    use flate2::{Compression, write::ZlibEncoder};

    use super::{loose_object_path, read_loose_object};
    use crate::{
        hash::ObjectHash,
        internal::{buffer::BufferPool, object::types::ObjectType},
    };

    /// Write `body` as a loose object of `kind` into `git_dir`, returning
    /// its id (fixture helper shared with the odb and status tests).
    pub(crate) fn write_loose_object(
        git_dir: &Path,
        kind: ObjectType,
        body: &[u8],
    ) -> ObjectHash {
        let hash = ObjectHash::from_type_and_data(kind, body);
        let path = loose_object_path(git_dir, &hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut plain = Vec::new();
        plain.extend_from_slice(kind.to_bytes());
        plain.push(b' ');
        plain.extend_from_slice(body.len().to_string().as_bytes());
        plain.push(0);
        plain.extend_from_slice(body);

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&plain).unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();
        hash
    }

    #[test]
    fn test_path_layout() {
        let hash: ObjectHash = "1205dc34ce48bda28fc543daaf9525a9bb6e6d10".parse().unwrap();
        let path = loose_object_path(Path::new("/repo/.git"), &hash);
        assert_eq!(
            path,
            Path::new("/repo/.git/objects/12/05dc34ce48bda28fc543daaf9525a9bb6e6d10")
        );
    }

    #[test]
    fn test_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new());
        let body = b"hello loose object\n";
        let hash = write_loose_object(dir.path(), ObjectType::Blob, body);

        let obj = read_loose_object(dir.path(), &hash, &pool)
            .unwrap()
            .expect("object exists");
        assert_eq!(obj.kind, ObjectType::Blob);
        assert_eq!(obj.size, body.len() as u64);

        let mut out = Vec::new();
        let mut reader = obj.body;
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    /// Bodies larger than the header preload stream lazily out of inflate.
    #[test]
    fn test_read_large_body() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new());
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 255) as u8).collect();
        let hash = write_loose_object(dir.path(), ObjectType::Blob, &body);

        let obj = read_loose_object(dir.path(), &hash, &pool)
            .unwrap()
            .expect("object exists");
        let mut out = Vec::new();
        let mut reader = obj.body;
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new());
        let hash = ObjectHash::new(b"nothing here");
        assert!(read_loose_object(dir.path(), &hash, &pool).unwrap().is_none());
    }

    #[test]
    fn test_missing_nul_is_malformed() {
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new());
        let hash = ObjectHash::new(b"bad");
        let path = loose_object_path(dir.path(), &hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"blob 12 no nul here whatsoever").unwrap();
        std::fs::write(&path, enc.finish().unwrap()).unwrap();

        assert!(matches!(
            read_loose_object(dir.path(), &hash, &pool),
            Err(crate::errors::GitError::InvalidLooseObject(_))
        ));
    }

    #[test]
    fn test_tree_type_header() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new());
        let hash = write_loose_object(dir.path(), ObjectType::Tree, b"");
        let obj = read_loose_object(dir.path(), &hash, &pool).unwrap().unwrap();
        assert_eq!(obj.kind, ObjectType::Tree);
        assert_eq!(obj.size, 0);
    }
}

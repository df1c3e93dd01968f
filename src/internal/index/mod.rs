//! Reader for the staging area (`.git/index`) binary format.
//!
//! Layout: 12-byte header (`DIRC`, version, entry count), then per entry a
//! 62-byte fixed block (times, device, inode, mode, uid, gid, size, hash,
//! flags), the path, and NUL padding to an 8-byte boundary counted from the
//! entry start. Version 3 adds a 16-bit extended-flags word when the
//! extended bit is set. All fixed fields are big-endian.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{errors::GitError, hash::ObjectHash, utils::CountingReader};

const INDEX_MAGIC: [u8; 4] = *b"DIRC";
/// Path length escape: the 12 flag bits cannot express the real length.
const NAME_LEN_MASK: u16 = 0x0FFF;
const EXTENDED_FLAG: u16 = 0x4000;
const ASSUME_VALID_FLAG: u16 = 0x8000;
const STAGE_MASK: u16 = 0x3000;

/// One staged file as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingEntry {
    pub ctime_sec: u32,
    pub ctime_nsec: u32,
    pub mtime_sec: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub hash: ObjectHash,
    pub flags: u16,
    pub path: String,
}

impl StagingEntry {
    /// Merge stage number: bits 12-13 of the flag word.
    pub fn stage(&self) -> u8 {
        ((self.flags & STAGE_MASK) >> 12) as u8
    }

    pub fn assume_valid(&self) -> bool {
        self.flags & ASSUME_VALID_FLAG != 0
    }

    /// Plain entries are the only ones the status engine compares: stage 0
    /// and the assume-valid bit clear.
    pub fn is_plain(&self) -> bool {
        self.stage() == 0 && !self.assume_valid()
    }
}

/// Read the staging index at `git_dir/index`; `None` when the repository
/// has no index yet.
pub fn read_staging_index(git_dir: &Path) -> Result<Option<Vec<StagingEntry>>, GitError> {
    let path = git_dir.join("index");
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::IOError(e)),
    };
    parse_staging_index(&mut BufReader::new(file), &path).map(Some)
}

fn parse_staging_index(
    reader: &mut impl Read,
    path: &Path,
) -> Result<Vec<StagingEntry>, GitError> {
    let malformed = |step: &str, e: io::Error| -> GitError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            GitError::InvalidIndexFile(format!("{}: truncated at {step}", path.display()))
        } else {
            GitError::IOError(e)
        }
    };

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| malformed("magic", e))?;
    if magic != INDEX_MAGIC {
        return Err(GitError::InvalidIndexHeader(format!(
            "{}: bad magic",
            path.display()
        )));
    }
    let version = reader
        .read_u32::<BigEndian>()
        .map_err(|e| malformed("version", e))?;
    if !(2..=4).contains(&version) {
        return Err(GitError::InvalidIndexHeader(format!(
            "{}: unsupported version {version}",
            path.display()
        )));
    }
    let count = reader
        .read_u32::<BigEndian>()
        .map_err(|e| malformed("entry count", e))?;

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut reader = CountingReader::new(&mut *reader);
        let entry = parse_entry(&mut reader, version, path)
            .map_err(|e| match e {
                GitError::IOError(io_err) => malformed(&format!("entry {i}"), io_err),
                other => other,
            })?;
        entries.push(entry);
    }
    // Extensions (TREE, REUC, ...) and the trailer hash follow; the
    // traversal layer has no use for them.
    Ok(entries)
}

fn parse_entry<R: Read>(
    reader: &mut CountingReader<&mut R>,
    version: u32,
    path: &Path,
) -> Result<StagingEntry, GitError> {
    let ctime_sec = reader.read_u32::<BigEndian>()?;
    let ctime_nsec = reader.read_u32::<BigEndian>()?;
    let mtime_sec = reader.read_u32::<BigEndian>()?;
    let mtime_nsec = reader.read_u32::<BigEndian>()?;
    let dev = reader.read_u32::<BigEndian>()?;
    let ino = reader.read_u32::<BigEndian>()?;
    let mode = reader.read_u32::<BigEndian>()?;
    let uid = reader.read_u32::<BigEndian>()?;
    let gid = reader.read_u32::<BigEndian>()?;
    let size = reader.read_u32::<BigEndian>()?;
    let hash = ObjectHash::from_stream(reader)?;
    let flags = reader.read_u16::<BigEndian>()?;

    if version >= 3 && flags & EXTENDED_FLAG != 0 {
        // Extended flags word (intent-to-add, skip-worktree); not surfaced.
        reader.read_u16::<BigEndian>()?;
    }

    let name_len = flags & NAME_LEN_MASK;
    let name_bytes = if name_len < NAME_LEN_MASK {
        let mut buf = vec![0u8; name_len as usize];
        reader.read_exact(&mut buf)?;
        buf
    } else {
        // Path too long for the 12-bit field: read to the first NUL.
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte)?;
            if byte[0] == 0 {
                break;
            }
            buf.push(byte[0]);
        }
        buf
    };
    let entry_path = String::from_utf8(name_bytes).map_err(|e| {
        GitError::InvalidIndexFile(format!("{}: non-UTF-8 path: {e}", path.display()))
    })?;

    // Pad the whole entry to an 8-byte boundary with at least one NUL.
    // The extended-path form already consumed its terminator.
    let consumed = reader.bytes_read;
    let padded = (consumed + 8) & !7;
    let pad = if name_len < NAME_LEN_MASK {
        padded - consumed
    } else {
        // One NUL was read as the path terminator already.
        (consumed.div_ceil(8) * 8) - consumed
    };
    for _ in 0..pad {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if byte[0] != 0 {
            return Err(GitError::InvalidIndexFile(format!(
                "{}: non-NUL entry padding",
                path.display()
            )));
        }
    }

    Ok(StagingEntry {
        ctime_sec,
        ctime_nsec,
        mtime_sec,
        mtime_nsec,
        dev,
        ino,
        mode,
        uid,
        gid,
        size,
        hash,
        flags,
        path: entry_path,
    })
}

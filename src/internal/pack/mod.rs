//! Pack file reading: `.idx` lookup tables, entry headers, delta chains and
//! the decoded-stream cache, faithfully following the
//! [pack-format spec](https://git-scm.com/docs/pack-format).

pub mod cache;
pub mod entry;
pub mod idx;
pub mod utils;

use std::io::Read;

use crate::errors::GitError;

/// Length of a pack file header: magic + version + object count.
pub const PACK_HEADER_LEN: u64 = 12;

/// Checks the 12-byte header of a pack file: the `PACK` magic identifier,
/// version 2, and the object count (returned).
pub fn check_header(pack: &mut impl Read) -> Result<u32, GitError> {
    let mut magic = [0; 4];
    pack.read_exact(&mut magic)
        .map_err(|_| GitError::InvalidPackHeader("truncated magic".to_string()))?;
    if magic != *b"PACK" {
        return Err(GitError::InvalidPackHeader(format!(
            "{},{},{},{}",
            magic[0], magic[1], magic[2], magic[3]
        )));
    }

    let mut version_bytes = [0; 4];
    pack.read_exact(&mut version_bytes)
        .map_err(|_| GitError::InvalidPackHeader("truncated version".to_string()))?;
    let version = u32::from_be_bytes(version_bytes);
    if version != 2 {
        return Err(GitError::InvalidPackFile(format!(
            "Version Number is {version}, not 2"
        )));
    }

    let mut object_num_bytes = [0; 4];
    pack.read_exact(&mut object_num_bytes)
        .map_err(|_| GitError::InvalidPackHeader("truncated object count".to_string()))?;
    Ok(u32::from_be_bytes(object_num_bytes))
}

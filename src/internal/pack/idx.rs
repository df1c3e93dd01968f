//! Reader for Git pack index (`.idx`) files, version 2.
//!
//! Layout: 8-byte header (magic `\xfftOc`, version), 256-entry cumulative
//! fanout, N ascending object hashes, N CRC32s, N 31-bit offsets with a
//! spill table of 64-bit offsets for entries whose top bit is set.
//! Everything multi-byte is big-endian.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{errors::GitError, hash::ObjectHash};

const IDX_MAGIC: [u8; 4] = [0xFF, 0x74, 0x4F, 0x63];
const IDX_VERSION: u32 = 2;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Location of one object inside a pack file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackObjectEntry {
    pub offset: u64,
    pub crc32: u32,
}

/// A parsed `.idx` file: the `hash → (offset, crc32)` table for one pack.
///
/// Immutable after parse; the object store caches one per pack for the
/// lifetime of the repository handle.
pub struct IndexFile {
    pub idx_path: PathBuf,
    pub pack_path: PathBuf,
    entries: HashMap<ObjectHash, PackObjectEntry>,
}

impl IndexFile {
    /// Parse the `.idx` at `idx_path`; the companion `.pack` path is derived
    /// by extension.
    pub fn parse(idx_path: &Path) -> Result<IndexFile, GitError> {
        let file = File::open(idx_path)?;
        let mut reader = BufReader::new(file);
        let entries = Self::parse_entries(&mut reader, idx_path)?;
        Ok(IndexFile {
            idx_path: idx_path.to_path_buf(),
            pack_path: idx_path.with_extension("pack"),
            entries,
        })
    }

    fn parse_entries(
        reader: &mut impl Read,
        idx_path: &Path,
    ) -> Result<HashMap<ObjectHash, PackObjectEntry>, GitError> {
        let malformed = |step: &str, e: io::Error| -> GitError {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                GitError::InvalidIdxFile(format!("{}: truncated at {step}", idx_path.display()))
            } else {
                GitError::IOError(e)
            }
        };

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| malformed("magic", e))?;
        if magic != IDX_MAGIC {
            return Err(GitError::InvalidIdxFile(format!(
                "{}: bad magic",
                idx_path.display()
            )));
        }
        let version = reader
            .read_u32::<BigEndian>()
            .map_err(|e| malformed("version", e))?;
        if version != IDX_VERSION {
            return Err(GitError::InvalidIdxFile(format!(
                "{}: unsupported version {version}",
                idx_path.display()
            )));
        }

        // Cumulative fanout; the last slot is the total object count.
        let mut total = 0u32;
        for _ in 0..256 {
            total = reader
                .read_u32::<BigEndian>()
                .map_err(|e| malformed("fanout", e))?;
        }
        let count = total as usize;

        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            let hash = ObjectHash::from_stream(reader).map_err(|e| malformed("names", e))?;
            hashes.push(hash);
        }

        let mut crcs = Vec::with_capacity(count);
        for _ in 0..count {
            crcs.push(
                reader
                    .read_u32::<BigEndian>()
                    .map_err(|e| malformed("crc32", e))?,
            );
        }

        // 31-bit offsets; top bit redirects into the large-offset table.
        let mut small_offsets = Vec::with_capacity(count);
        let mut large_count = 0usize;
        for _ in 0..count {
            let v = reader
                .read_u32::<BigEndian>()
                .map_err(|e| malformed("offsets", e))?;
            if v & LARGE_OFFSET_FLAG != 0 {
                large_count = large_count.max((v & !LARGE_OFFSET_FLAG) as usize + 1);
            }
            small_offsets.push(v);
        }
        let mut large_offsets = Vec::with_capacity(large_count);
        for _ in 0..large_count {
            large_offsets.push(
                reader
                    .read_u64::<BigEndian>()
                    .map_err(|e| malformed("large offsets", e))?,
            );
        }

        let mut entries = HashMap::with_capacity(count);
        for (i, hash) in hashes.into_iter().enumerate() {
            let raw = small_offsets[i];
            let offset = if raw & LARGE_OFFSET_FLAG != 0 {
                let slot = (raw & !LARGE_OFFSET_FLAG) as usize;
                *large_offsets.get(slot).ok_or_else(|| {
                    GitError::InvalidIdxFile(format!(
                        "{}: large offset slot {slot} out of range",
                        idx_path.display()
                    ))
                })?
            } else {
                raw as u64
            };
            entries.insert(
                hash,
                PackObjectEntry {
                    offset,
                    crc32: crcs[i],
                },
            );
        }
        Ok(entries)
    }

    /// Locate an object in this pack.
    pub fn lookup(&self, hash: &ObjectHash) -> Option<PackObjectEntry> {
        self.entries.get(hash).copied()
    }

    pub fn object_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all `(hash, entry)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectHash, &PackObjectEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::{IndexFile, PackObjectEntry};
    use crate::hash::ObjectHash;

    /// Serialise an idx v2 image for the given entries (test fixture
    /// builder; trailer hashes are zero-filled since the parser trusts
    /// them).
    pub(crate) fn build_idx_bytes(entries: &[(ObjectHash, PackObjectEntry)]) -> Vec<u8> {
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        out.extend_from_slice(&[0xFF, 0x74, 0x4F, 0x63, 0, 0, 0, 2]);

        let mut fanout = [0u32; 256];
        for (hash, _) in &sorted {
            fanout[hash.0[0] as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }
        for count in fanout {
            out.extend_from_slice(&count.to_be_bytes());
        }
        for (hash, _) in &sorted {
            out.extend_from_slice(hash.as_ref());
        }
        for (_, e) in &sorted {
            out.extend_from_slice(&e.crc32.to_be_bytes());
        }
        let mut large = Vec::new();
        for (_, e) in &sorted {
            if e.offset <= 0x7FFF_FFFF {
                out.extend_from_slice(&(e.offset as u32).to_be_bytes());
            } else {
                let marker = 0x8000_0000u32 | large.len() as u32;
                out.extend_from_slice(&marker.to_be_bytes());
                large.push(e.offset);
            }
        }
        for v in large {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&[0u8; 40]);
        out
    }

    fn parse_bytes(bytes: &[u8]) -> Result<HashMap<ObjectHash, PackObjectEntry>, crate::errors::GitError>
    {
        let mut cursor = std::io::Cursor::new(bytes);
        IndexFile::parse_entries(&mut cursor, std::path::Path::new("test.idx"))
    }

    fn fake_hash(n: u8) -> ObjectHash {
        ObjectHash([n; 20])
    }

    /// Every written entry decodes back to the same offset and crc32.
    #[test]
    fn test_round_trip() {
        let entries: Vec<_> = (0u8..5)
            .map(|i| {
                (
                    fake_hash(i),
                    PackObjectEntry {
                        offset: 0x10 + (i as u64) * 3,
                        crc32: 0x12345678 + i as u32,
                    },
                )
            })
            .collect();
        let bytes = build_idx_bytes(&entries);
        let parsed = parse_bytes(&bytes).unwrap();
        assert_eq!(parsed.len(), 5);
        for (hash, entry) in &entries {
            assert_eq!(parsed[hash], *entry);
        }
    }

    /// Offsets above 2^31 go through the large-offset table.
    #[test]
    fn test_large_offsets() {
        let entries = vec![
            (
                fake_hash(1),
                PackObjectEntry {
                    offset: 12,
                    crc32: 1,
                },
            ),
            (
                fake_hash(2),
                PackObjectEntry {
                    offset: 0x1_2345_6789,
                    crc32: 2,
                },
            ),
        ];
        let bytes = build_idx_bytes(&entries);
        let parsed = parse_bytes(&bytes).unwrap();
        assert_eq!(parsed[&fake_hash(2)].offset, 0x1_2345_6789);
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut bytes = build_idx_bytes(&[]);
        bytes[0] = 0x00;
        assert!(matches!(
            parse_bytes(&bytes),
            Err(crate::errors::GitError::InvalidIdxFile(_))
        ));
    }

    #[test]
    fn test_bad_version_is_malformed() {
        let mut bytes = build_idx_bytes(&[]);
        bytes[7] = 3;
        assert!(matches!(
            parse_bytes(&bytes),
            Err(crate::errors::GitError::InvalidIdxFile(_))
        ));
    }

    #[test]
    fn test_truncated_table_is_malformed() {
        let entries = vec![(
            fake_hash(9),
            PackObjectEntry {
                offset: 100,
                crc32: 7,
            },
        )];
        let mut bytes = build_idx_bytes(&entries);
        bytes.truncate(8 + 256 * 4 + 10); // mid-hash-table
        assert!(matches!(
            parse_bytes(&bytes),
            Err(crate::errors::GitError::InvalidIdxFile(_))
        ));
    }
}

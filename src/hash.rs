//! SHA-1 object identifiers.
//!
//! Repositories traversed by this crate use the classic 20-byte object id.
//! Hashes are trusted as read; this module only parses, formats and computes
//! them, it never verifies object contents against their id.

use std::{fmt::Display, io, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::internal::object::types::ObjectType;

/// A 20-byte Git object id.
///
/// Supports conversion to/from hex strings, byte slices, and stream reading.
/// Equality, ordering and hashing are by bytes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
pub struct ObjectHash(pub [u8; 20]);

impl Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for ObjectHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Parse a 40-char hex string into an `ObjectHash`.
impl FromStr for ObjectHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err("Invalid hash length".to_string());
        }
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        let mut h = [0u8; 20];
        h.copy_from_slice(bytes.as_slice());
        Ok(ObjectHash(h))
    }
}

impl ObjectHash {
    /// Byte length of the hash.
    pub const SIZE: usize = 20;

    /// The all-zero id Git uses as a null sentinel in reflogs and FETCH_HEAD.
    pub fn zero() -> ObjectHash {
        ObjectHash([0u8; 20])
    }

    /// True for the all-zero sentinel value.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Compute the SHA-1 of raw data.
    pub fn new(data: &[u8]) -> ObjectHash {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(digest.as_ref());
        ObjectHash(bytes)
    }

    /// Compute the object id for a typed payload: `sha1("<type> <len>\0" + data)`.
    pub fn from_type_and_data(object_type: ObjectType, data: &[u8]) -> ObjectHash {
        let mut hasher = Sha1::new();
        hasher.update(object_type.to_bytes());
        hasher.update(b" ");
        hasher.update(data.len().to_string().as_bytes());
        hasher.update(b"\x00");
        hasher.update(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(hasher.finalize().as_ref());
        ObjectHash(bytes)
    }

    /// Create an `ObjectHash` from a 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<ObjectHash, String> {
        if bytes.len() != Self::SIZE {
            return Err(format!(
                "Invalid byte length: got {}, expected {}",
                bytes.len(),
                Self::SIZE
            ));
        }
        let mut h = [0u8; 20];
        h.copy_from_slice(bytes);
        Ok(ObjectHash(h))
    }

    /// Read 20 hash bytes from a stream.
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<ObjectHash> {
        let mut h = [0u8; 20];
        data.read_exact(&mut h)?;
        Ok(ObjectHash(h))
    }

    /// Return raw bytes of the hash.
    pub fn to_data(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Incremental SHA-1 over the canonical blob framing `"blob <len>\0" + bytes`.
///
/// Used by the status engine to hash on-disk files the way `git hash-object`
/// does, without loading the file into memory at once.
pub struct BlobHasher {
    inner: Sha1,
}

impl BlobHasher {
    /// Start a blob hash for a payload of `len` bytes.
    pub fn new(len: u64) -> Self {
        let mut inner = Sha1::new();
        inner.update(ObjectType::Blob.to_bytes());
        inner.update(b" ");
        inner.update(len.to_string().as_bytes());
        inner.update(b"\x00");
        BlobHasher { inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> ObjectHash {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(self.inner.finalize().as_ref());
        ObjectHash(bytes)
    }
}

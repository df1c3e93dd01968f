//! Object model definitions for Git blobs, trees, commits and tags, plus the
//! trait that lets the object database create strongly typed values from the
//! raw byte streams it resolves.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

use crate::{errors::GitError, hash::ObjectHash, internal::object::types::ObjectType};

/// **The Object Trait**
/// Defines the common read-side interface for all Git object types.
pub trait ObjectTrait: Send + Sync + std::fmt::Display {
    /// Creates a new object from a byte slice.
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError>
    where
        Self: Sized;

    /// Returns the type of the object.
    fn get_type(&self) -> ObjectType;

    /// Size of the decoded payload in bytes.
    fn get_size(&self) -> usize;
}

//! Error types for the Git-Traverse crate.
//!
//! This module defines a unified error enumeration used across object
//! resolution, pack/idx parsing, staging-index handling, status scanning and
//! streaming. It integrates with `thiserror` to provide rich `Display`
//! implementations and error source chaining where applicable.
//!
//! Notes:
//! - Absence of an object or ref is never an error: lookup APIs return
//!   `Ok(None)` instead.
//! - Each `Invalid*` variant carries the offending artefact (path, step or
//!   offset) via its message payload.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the Git-Traverse library.
///
/// - Used across loose/pack object reading, delta reconstruction, staging
///   index parsing, ref resolution and the status engine.
/// - Implements `std::error::Error` via `thiserror`.
pub enum GitError {
    /// Invalid or unsupported git object type name or pack type tag.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Malformed loose object frame (bad header, missing NUL, bad size).
    #[error("The `{0}` is not a valid loose object.")]
    InvalidLooseObject(String),

    /// Malformed tree object.
    #[error("Not a valid git tree object: {0}")]
    InvalidTreeObject(String),

    /// Invalid tree entry (mode/name/hash).
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Malformed commit object.
    #[error("Not a valid git commit object: {0}")]
    InvalidCommitObject(String),

    /// Invalid commit signature line.
    #[error("The `{0}` is not a valid git commit signature.")]
    InvalidSignatureType(String),

    /// Malformed tag object.
    #[error("Not a valid git tag object: {0}")]
    InvalidTagObject(String),

    /// Malformed or unsupported pack index (.idx) file.
    #[error("The `{0}` is not a valid idx file.")]
    InvalidIdxFile(String),

    /// Malformed or unsupported pack file.
    #[error("The `{0}` is not a valid pack file.")]
    InvalidPackFile(String),

    /// Invalid pack header magic or version.
    #[error("The `{0}` is not a valid pack header.")]
    InvalidPackHeader(String),

    /// Malformed or unsupported staging index file.
    #[error("The `{0}` is not a valid index file.")]
    InvalidIndexFile(String),

    /// Invalid staging index header.
    #[error("The `{0}` is not a valid index header.")]
    InvalidIndexHeader(String),

    /// Malformed ref, packed-refs line or unresolvable symbolic chain.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// I/O error from the underlying filesystem.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// Invalid SHA-1 hash formatting or value.
    #[error("The {0} is not a valid Hash value ")]
    InvalidHashValue(String),

    /// Delta object reconstruction error.
    #[error("Delta Object Error Info:{0}")]
    DeltaObjectError(String),

    /// Invalid decoded object info.
    #[error("Error decode in the Object ,info:{0}")]
    InvalidObjectInfo(String),

    /// Pack index claims a hash that its pack cannot deliver.
    #[error("Cannot find Hash value: {0} from current file")]
    NotFoundHashValue(String),

    /// Text encoding or UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    ConversionError(String),

    /// Operation observed a cancellation request at a suspension point.
    #[error("Operation cancelled")]
    Cancelled,

    /// Accessor invoked after the repository handle was closed.
    #[error("Repository handle is closed")]
    Disposed,
}

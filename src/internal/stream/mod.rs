//! Composable read-only byte streams.
//!
//! Object payloads are produced by stitching these primitives together: a
//! preloaded-but-unconsumed prefix ahead of a file descriptor
//! ([`PreloadStream`] + [`ConcatStream`]), a hard byte limit
//! ([`RangedStream`]), a seekable replay buffer for delta bases
//! ([`MemoizedStream`]) and a reference-counted handle for cached streams
//! ([`SharedStream`]).

mod concat;
mod memoized;
mod preload;
mod ranged;
mod shared;

use std::io::{Read, Seek};

pub use concat::ConcatStream;
pub use memoized::MemoizedStream;
pub use preload::PreloadStream;
pub use ranged::RangedStream;
pub use shared::SharedStream;

/// A readable, seekable, sendable byte source.
///
/// The delta decoder requires its base stream to carry this capability;
/// forward-only sources must be wrapped in [`MemoizedStream`] first.
pub trait SeekableStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekableStream for T {}

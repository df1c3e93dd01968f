//! Streaming zlib decompression over buffered readers.

pub mod inflate;

pub use inflate::InflateReader;

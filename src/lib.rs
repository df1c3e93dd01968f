//! Git-Traverse is a read-only traversal library for locally stored Git repositories.
//!
//! It exposes a primitive view (raw typed object byte streams resolved through
//! loose objects and pack files, including delta reconstruction) and a
//! structured view (parsed commits, trees, tags, branches, reflog entries,
//! worktrees and working-directory status). The library never mutates the
//! repository and performs no network I/O.
pub mod errors;
pub mod hash;
pub mod internal;
pub mod repository;
pub mod utils;

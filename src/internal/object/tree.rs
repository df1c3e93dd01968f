//! The Tree object represents one directory level: an ordered list of
//! `(mode, name, id)` entries pointing at blobs, subtrees, symlinks and
//! submodule commits.
//!
//! Wire format per entry: `"<octal mode> <name>\0"` followed by the raw
//! 20-byte id of the child.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, types::ObjectType},
};

/// File mode of a tree entry.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Link,
    Tree,
    /// Gitlink: a submodule commit pinned inside the tree.
    Commit,
}

impl TreeItemMode {
    /// Parse the octal mode bytes as they appear on disk.
    ///
    /// Trees written by old Gits carry `040000` for subtrees; canonical ones
    /// write `40000`. Both are accepted.
    pub fn tree_item_type_from_bytes(mode: &[u8]) -> Result<TreeItemMode, GitError> {
        Ok(match mode {
            b"40000" | b"040000" => TreeItemMode::Tree,
            b"100644" | b"100664" => TreeItemMode::Blob,
            b"100755" => TreeItemMode::BlobExecutable,
            b"120000" => TreeItemMode::Link,
            b"160000" => TreeItemMode::Commit,
            _ => {
                return Err(GitError::InvalidTreeItem(
                    String::from_utf8_lossy(mode).to_string(),
                ));
            }
        })
    }

    /// Canonical on-disk octal spelling.
    pub fn to_bytes(self) -> &'static [u8] {
        match self {
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Link => b"120000",
            TreeItemMode::Tree => b"40000",
            TreeItemMode::Commit => b"160000",
        }
    }

    /// True for entries that resolve to file content in a working tree.
    pub fn is_file_like(self) -> bool {
        matches!(
            self,
            TreeItemMode::Blob | TreeItemMode::BlobExecutable | TreeItemMode::Link
        )
    }
}

impl Display for TreeItemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.to_bytes()))
    }
}

/// One `(mode, id, name)` child of a tree.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: ObjectHash,
    pub name: String,
}

/// One directory level of a snapshot.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub id: ObjectHash,
    pub tree_items: Vec<TreeItem>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for item in &self.tree_items {
            writeln!(f, "{} {} {}", item.mode, item.id, item.name)?;
        }
        Ok(())
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut tree_items = Vec::new();
        let mut rest = data;

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|b| *b == b' ')
                .ok_or_else(|| GitError::InvalidTreeObject("missing mode separator".into()))?;
            let mode = TreeItemMode::tree_item_type_from_bytes(&rest[..space])?;
            rest = &rest[space + 1..];

            let nul = memchr::memchr(0, rest)
                .ok_or_else(|| GitError::InvalidTreeObject("missing name terminator".into()))?;
            let name = String::from_utf8_lossy(&rest[..nul]).to_string();
            rest = &rest[nul + 1..];

            if rest.len() < ObjectHash::SIZE {
                return Err(GitError::InvalidTreeObject(format!(
                    "truncated entry id for `{name}`"
                )));
            }
            let id = ObjectHash::from_bytes(&rest[..ObjectHash::SIZE])
                .map_err(GitError::InvalidHashValue)?;
            rest = &rest[ObjectHash::SIZE..];

            tree_items.push(TreeItem { mode, id, name });
        }

        Ok(Tree {
            id: hash,
            tree_items,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        self.tree_items
            .iter()
            .map(|i| i.mode.to_bytes().len() + 1 + i.name.len() + 1 + ObjectHash::SIZE)
            .sum()
    }
}

//! The Commit object records one version of a project: the root tree it
//! points to, the parent commits it grew from, the author and committer
//! identities, and the message.
//!
//! Wire format: `tree <id>`, zero or more `parent <id>` lines, `author` and
//! `committer` signatures, optional extra headers (`gpgsig`, `encoding`,
//! with space-indented continuation lines), one blank line, then the
//! message.

use std::fmt::Display;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, signature::Signature, types::ObjectType},
};

/// A commit and the metadata parsed out of its header block.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: ObjectHash,
    pub tree_id: ObjectHash,
    pub parent_commit_ids: Vec<ObjectHash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tree: {}", self.tree_id)?;
        for parent in self.parent_commit_ids.iter() {
            writeln!(f, "parent: {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f, "{}", self.message)
    }
}

impl Commit {
    /// First meaningful message line, for one-line log displays.
    pub fn format_message(&self) -> String {
        self.message
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_owned())
            .unwrap_or_else(|| self.message.clone())
    }
}

impl ObjectTrait for Commit {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut tree_id = None;
        let mut parent_commit_ids = Vec::new();
        let mut author = None;
        let mut committer = None;

        let mut rest = data;
        loop {
            let line_end = rest.find_byte(b'\n').unwrap_or(rest.len());
            let line = &rest[..line_end];
            rest = &rest[(line_end + 1).min(rest.len())..];

            if line.is_empty() {
                // End of header block; the remainder is the message.
                break;
            }
            if line[0] == b' ' {
                // Continuation of a multi-line header (gpgsig); skipped.
                continue;
            }

            let space = line
                .find_byte(b' ')
                .ok_or_else(|| GitError::InvalidCommitObject("header without value".into()))?;
            let (key, value) = (&line[..space], &line[space + 1..]);
            match key {
                b"tree" => {
                    tree_id = Some(parse_hex_id(value)?);
                }
                b"parent" => {
                    parent_commit_ids.push(parse_hex_id(value)?);
                }
                b"author" => {
                    author = Some(Signature::from_data(line)?);
                }
                b"committer" => {
                    committer = Some(Signature::from_data(line)?);
                }
                // gpgsig, encoding and future headers are tolerated.
                _ => {}
            }
        }

        let message = String::from_utf8_lossy(rest).to_string();

        Ok(Commit {
            id: hash,
            tree_id: tree_id
                .ok_or_else(|| GitError::InvalidCommitObject("missing tree header".into()))?,
            parent_commit_ids,
            author: author
                .ok_or_else(|| GitError::InvalidCommitObject("missing author header".into()))?,
            committer: committer
                .ok_or_else(|| GitError::InvalidCommitObject("missing committer header".into()))?,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn get_size(&self) -> usize {
        self.message.len()
    }
}

fn parse_hex_id(value: &[u8]) -> Result<ObjectHash, GitError> {
    let s = value
        .to_str()
        .map_err(|e| GitError::InvalidCommitObject(e.to_string()))?;
    s.trim()
        .parse()
        .map_err(|_| GitError::InvalidHashValue(s.to_string()))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Commit;
    use crate::{
        hash::ObjectHash,
        internal::object::{ObjectTrait, types::ObjectType},
    };

    const SAMPLE: &str = "tree 5462bf28fdc4681762057cac7704730b1c590b38\n\
        parent 1205dc34ce48bda28fc543daaf9525a9bb6e6d10\n\
        author Eli Ma <genedna@gmail.com> 1678101573 +0800\n\
        committer Eli Ma <genedna@gmail.com> 1678101573 +0800\n\
        \n\
        Initial commit\n";

    #[test]
    fn test_parse_commit() {
        let id = ObjectHash::from_type_and_data(ObjectType::Commit, SAMPLE.as_bytes());
        let commit = Commit::from_bytes(SAMPLE.as_bytes(), id).unwrap();
        assert_eq!(
            commit.tree_id,
            ObjectHash::from_str("5462bf28fdc4681762057cac7704730b1c590b38").unwrap()
        );
        assert_eq!(commit.parent_commit_ids.len(), 1);
        assert_eq!(commit.author.name, "Eli Ma");
        assert_eq!(commit.message.trim(), "Initial commit");
        assert_eq!(commit.format_message(), "Initial commit");
    }

    #[test]
    fn test_parse_root_commit_without_parents() {
        let body = "tree 5462bf28fdc4681762057cac7704730b1c590b38\n\
            author A <a@b.c> 0 +0000\n\
            committer A <a@b.c> 0 +0000\n\
            \n\
            root\n";
        let commit = Commit::from_bytes(body.as_bytes(), ObjectHash::new(body.as_bytes())).unwrap();
        assert!(commit.parent_commit_ids.is_empty());
    }

    #[test]
    fn test_gpgsig_is_tolerated() {
        let body = "tree 5462bf28fdc4681762057cac7704730b1c590b38\n\
            author A <a@b.c> 0 +0000\n\
            committer A <a@b.c> 0 +0000\n\
            gpgsig -----BEGIN PGP SIGNATURE-----\n \
            fakesignaturepayload\n \
            -----END PGP SIGNATURE-----\n\
            \n\
            signed\n";
        let commit = Commit::from_bytes(body.as_bytes(), ObjectHash::new(body.as_bytes())).unwrap();
        assert_eq!(commit.message.trim(), "signed");
    }

    #[test]
    fn test_missing_tree_is_error() {
        let body = "author A <a@b.c> 0 +0000\ncommitter A <a@b.c> 0 +0000\n\nx\n";
        assert!(Commit::from_bytes(body.as_bytes(), ObjectHash::new(b"")).is_err());
    }
}

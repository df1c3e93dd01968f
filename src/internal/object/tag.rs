//! The Tag object is an annotated tag: a named pointer at another object
//! (almost always a commit), with a tagger identity and a message.
//!
//! Wire format: `object <id>`, `type <name>`, `tag <name>`, an optional
//! `tagger` signature, one blank line, then the message.

use std::fmt::Display;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, signature::Signature, types::ObjectType},
};

/// An annotated tag object.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: ObjectHash,
    pub object_id: ObjectHash,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Option<Signature>,
    pub message: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "object {}", self.object_id)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        if let Some(tagger) = &self.tagger {
            writeln!(f, "{tagger}")?;
        }
        writeln!(f, "{}", self.message)
    }
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        let mut object_id = None;
        let mut object_type = None;
        let mut tag_name = None;
        let mut tagger = None;

        let mut rest = data;
        loop {
            let line_end = rest.find_byte(b'\n').unwrap_or(rest.len());
            let line = &rest[..line_end];
            rest = &rest[(line_end + 1).min(rest.len())..];

            if line.is_empty() {
                break;
            }
            if line[0] == b' ' {
                continue;
            }

            let space = line
                .find_byte(b' ')
                .ok_or_else(|| GitError::InvalidTagObject("header without value".into()))?;
            let (key, value) = (&line[..space], &line[space + 1..]);
            let value_str = || {
                value
                    .to_str()
                    .map(|s| s.trim().to_string())
                    .map_err(|e| GitError::InvalidTagObject(e.to_string()))
            };
            match key {
                b"object" => {
                    object_id = Some(
                        value_str()?
                            .parse::<ObjectHash>()
                            .map_err(GitError::InvalidHashValue)?,
                    );
                }
                b"type" => {
                    object_type = Some(ObjectType::from_string(&value_str()?)?);
                }
                b"tag" => {
                    tag_name = Some(value_str()?);
                }
                b"tagger" => {
                    tagger = Some(Signature::from_data(line)?);
                }
                _ => {}
            }
        }

        Ok(Tag {
            id: hash,
            object_id: object_id
                .ok_or_else(|| GitError::InvalidTagObject("missing object header".into()))?,
            object_type: object_type
                .ok_or_else(|| GitError::InvalidTagObject("missing type header".into()))?,
            tag_name: tag_name
                .ok_or_else(|| GitError::InvalidTagObject("missing tag header".into()))?,
            tagger,
            message: String::from_utf8_lossy(rest).to_string(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        self.message.len()
    }
}

//! The Blob object stores the raw content of one file. It carries no
//! structure of its own; trees give blobs their names and modes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::{ObjectTrait, types::ObjectType},
};

/// One file's content, addressed by its object id.
#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: ObjectHash,
    pub data: Vec<u8>,
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Size: {}", self.data.len())
    }
}

impl ObjectTrait for Blob {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError> {
        Ok(Blob {
            id: hash,
            data: data.to_vec(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn get_size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Blob;
    use crate::{
        hash::ObjectHash,
        internal::object::{ObjectTrait, types::ObjectType},
    };

    #[test]
    fn test_from_bytes() {
        let body = b"Hello, World!\n";
        let id = ObjectHash::from_type_and_data(ObjectType::Blob, body);
        let blob = Blob::from_bytes(body, id).unwrap();
        assert_eq!(blob.get_type(), ObjectType::Blob);
        assert_eq!(blob.get_size(), body.len());
        assert_eq!(blob.data, body);
    }
}

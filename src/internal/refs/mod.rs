//! Text-format ref plumbing: `HEAD`, loose refs, `packed-refs`,
//! `FETCH_HEAD`, reflog and `config` files.
//!
//! Loose refs shadow packed ones; symbolic chains are chased with a depth
//! limit so a cyclic `HEAD` cannot hang resolution.

pub mod config;

use std::{
    fs,
    io::{self, BufRead, BufReader},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::signature::Signature,
};

/// Symbolic chains longer than this are treated as cycles.
const MAX_SYMBOLIC_DEPTH: usize = 10;

/// What a ref points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefTarget {
    Direct(ObjectHash),
    Symbolic(String),
}

/// A named ref and its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub target: RefTarget,
}

/// A local or remote-tracking branch head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Short name, e.g. `main` or `origin/main`.
    pub name: String,
    pub commit_id: ObjectHash,
    pub is_remote: bool,
}

/// A tag ref; `peeled` carries the commit an annotated tag dereferences to
/// when `packed-refs` recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub name: String,
    pub id: ObjectHash,
    pub peeled: Option<ObjectHash>,
}

/// One line of a ref's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflogEntry {
    pub old_id: ObjectHash,
    pub new_id: ObjectHash,
    pub committer: Signature,
    pub message: String,
}

/// One line of `FETCH_HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchHead {
    pub id: ObjectHash,
    pub for_merge: bool,
    pub description: String,
}

fn read_text_file(path: &Path) -> Result<Option<String>, GitError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GitError::IOError(e)),
    }
}

fn parse_ref_target(text: &str, name: &str) -> Result<RefTarget, GitError> {
    let line = text.lines().next().unwrap_or("").trim();
    if let Some(target) = line.strip_prefix("ref: ") {
        return Ok(RefTarget::Symbolic(target.trim().to_string()));
    }
    line.parse::<ObjectHash>()
        .map(RefTarget::Direct)
        .map_err(|_| GitError::InvalidReference(format!("{name}: `{line}`")))
}

/// Read `HEAD`; `None` when the file is absent (not yet born repository
/// copies still have one, so this is rare).
pub fn read_head(git_dir: &Path) -> Result<Option<RefTarget>, GitError> {
    match read_text_file(&git_dir.join("HEAD"))? {
        Some(text) => Ok(Some(parse_ref_target(&text, "HEAD")?)),
        None => Ok(None),
    }
}

/// Read one loose ref file by full name (`refs/heads/main`).
pub fn read_loose_ref(git_dir: &Path, name: &str) -> Result<Option<RefTarget>, GitError> {
    match read_text_file(&git_dir.join(name))? {
        Some(text) => Ok(Some(parse_ref_target(&text, name)?)),
        None => Ok(None),
    }
}

/// Parse `packed-refs`: `<hex> <name>` lines, `^<hex>` peel lines attached
/// to the preceding ref, `#` header lines tolerated.
pub fn read_packed_refs(git_dir: &Path) -> Result<Vec<TagRef>, GitError> {
    let Some(text) = read_text_file(&git_dir.join("packed-refs"))? else {
        return Ok(Vec::new());
    };

    let mut refs: Vec<TagRef> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(peel) = line.strip_prefix('^') {
            let id = peel
                .trim()
                .parse::<ObjectHash>()
                .map_err(|_| GitError::InvalidReference(format!("packed-refs peel `{line}`")))?;
            match refs.last_mut() {
                Some(last) => last.peeled = Some(id),
                None => {
                    return Err(GitError::InvalidReference(
                        "packed-refs peel line without a ref".to_string(),
                    ));
                }
            }
            continue;
        }
        let (hex, name) = line.split_once(' ').ok_or_else(|| {
            GitError::InvalidReference(format!("packed-refs line `{line}`"))
        })?;
        let id = hex
            .parse::<ObjectHash>()
            .map_err(|_| GitError::InvalidReference(format!("packed-refs line `{line}`")))?;
        refs.push(TagRef {
            name: name.trim().to_string(),
            id,
            peeled: None,
        });
    }
    Ok(refs)
}

/// Resolve a full ref name to a hash, chasing symbolic hops. Loose refs
/// shadow packed entries.
pub fn resolve_ref(git_dir: &Path, name: &str) -> Result<Option<ObjectHash>, GitError> {
    let mut current = name.to_string();
    for _ in 0..MAX_SYMBOLIC_DEPTH {
        if let Some(target) = read_loose_ref(git_dir, &current)? {
            match target {
                RefTarget::Direct(id) => return Ok(Some(id)),
                RefTarget::Symbolic(next) => {
                    current = next;
                    continue;
                }
            }
        }
        let packed = read_packed_refs(git_dir)?;
        if let Some(found) = packed.iter().find(|r| r.name == current) {
            return Ok(Some(found.id));
        }
        return Ok(None);
    }
    Err(GitError::InvalidReference(format!(
        "symbolic chain from `{name}` exceeds {MAX_SYMBOLIC_DEPTH} hops"
    )))
}

/// Resolve `HEAD` to a commit id, if it points anywhere yet.
pub fn resolve_head(git_dir: &Path) -> Result<Option<ObjectHash>, GitError> {
    match read_head(git_dir)? {
        Some(RefTarget::Direct(id)) => Ok(Some(id)),
        Some(RefTarget::Symbolic(name)) => resolve_ref(git_dir, &name),
        None => Ok(None),
    }
}

/// The branch `HEAD` is on, when it is symbolic into `refs/heads`.
pub fn head_branch_name(git_dir: &Path) -> Result<Option<String>, GitError> {
    match read_head(git_dir)? {
        Some(RefTarget::Symbolic(name)) => {
            Ok(name.strip_prefix("refs/heads/").map(|b| b.to_string()))
        }
        _ => Ok(None),
    }
}

/// Enumerate all refs under `prefix` (e.g. `refs/heads`), merging loose
/// files over packed entries.
fn list_refs(git_dir: &Path, prefix: &str) -> Result<Vec<(String, ObjectHash)>, GitError> {
    let mut found: Vec<(String, ObjectHash)> = Vec::new();

    // Packed first, so loose entries can shadow them.
    let prefix_dir = format!("{prefix}/");
    for packed in read_packed_refs(git_dir)? {
        if packed.name.starts_with(&prefix_dir) {
            found.push((packed.name, packed.id));
        }
    }

    let root = git_dir.join(prefix);
    let mut stack = vec![root.clone()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(GitError::IOError(e)),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
                continue;
            }
            let relative = path
                .strip_prefix(&root)
                .expect("entry under its scan root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let full_name = format!("{prefix}/{relative}");
            if let Some(id) = resolve_ref(git_dir, &full_name)? {
                found.retain(|(name, _)| *name != full_name);
                found.push((full_name, id));
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Local branches plus remote-tracking branches.
pub fn branches(git_dir: &Path) -> Result<Vec<Branch>, GitError> {
    let mut out = Vec::new();
    for (name, id) in list_refs(git_dir, "refs/heads")? {
        out.push(Branch {
            name: name["refs/heads/".len()..].to_string(),
            commit_id: id,
            is_remote: false,
        });
    }
    for (name, id) in list_refs(git_dir, "refs/remotes")? {
        let short = &name["refs/remotes/".len()..];
        // Symbolic remote HEADs (origin/HEAD) resolve like any ref.
        out.push(Branch {
            name: short.to_string(),
            commit_id: id,
            is_remote: true,
        });
    }
    Ok(out)
}

/// All tag refs, with packed peel targets where recorded.
pub fn tags(git_dir: &Path) -> Result<Vec<TagRef>, GitError> {
    let packed: Vec<TagRef> = read_packed_refs(git_dir)?
        .into_iter()
        .filter(|r| r.name.starts_with("refs/tags/"))
        .collect();

    let mut out = Vec::new();
    for (name, id) in list_refs(git_dir, "refs/tags")? {
        let peeled = packed
            .iter()
            .find(|p| p.name == name && p.id == id)
            .and_then(|p| p.peeled);
        out.push(TagRef {
            name: name["refs/tags/".len()..].to_string(),
            id,
            peeled,
        });
    }
    Ok(out)
}

/// Parse `FETCH_HEAD`: `<hex>\t(not-for-merge\t)?<description>` per line.
pub fn read_fetch_head(git_dir: &Path) -> Result<Vec<FetchHead>, GitError> {
    let Some(text) = read_text_file(&git_dir.join("FETCH_HEAD"))? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let hex = fields.next().unwrap_or("").trim();
        let id = hex
            .parse::<ObjectHash>()
            .map_err(|_| GitError::InvalidReference(format!("FETCH_HEAD line `{line}`")))?;
        let marker = fields.next().unwrap_or("");
        let (for_merge, description) = if marker == "not-for-merge" {
            (false, fields.next().unwrap_or(""))
        } else {
            (true, marker)
        };
        out.push(FetchHead {
            id,
            for_merge,
            description: description.trim().to_string(),
        });
    }
    Ok(out)
}

/// Read the reflog for a full ref name (or `HEAD`); missing log → empty.
pub fn read_reflog(git_dir: &Path, ref_name: &str) -> Result<Vec<ReflogEntry>, GitError> {
    let path = git_dir.join("logs").join(ref_name);
    let file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(GitError::IOError(e)),
    };

    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (meta, message) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        if meta.len() < 82 {
            return Err(GitError::InvalidReference(format!(
                "reflog line too short in {ref_name}"
            )));
        }
        let old_id = meta[..40]
            .parse::<ObjectHash>()
            .map_err(|_| GitError::InvalidReference(format!("reflog old id in {ref_name}")))?;
        let new_id = meta[41..81]
            .parse::<ObjectHash>()
            .map_err(|_| GitError::InvalidReference(format!("reflog new id in {ref_name}")))?;
        // The identity reuses the commit signature form, minus the role.
        let committer = Signature::from_data(format!("committer {}", &meta[82..]).as_bytes())?;
        out.push(ReflogEntry {
            old_id,
            new_id,
            committer,
            message: message.trim().to_string(),
        });
    }
    Ok(out)
}

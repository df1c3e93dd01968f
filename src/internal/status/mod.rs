//! Working-directory status engine.
//!
//! Compares three snapshots of the project (the `HEAD` tree, the staging
//! index, and the files on disk) and classifies every difference as
//! staged, unstaged or untracked. The untracked scan descends the working
//! tree composing `.gitignore` filters hierarchically.

use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{BufReader, Read},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::GitError,
    hash::{BlobHasher, ObjectHash},
    internal::{
        ignore::filter::{self, FilterDecision, PathFilter},
        index::{StagingEntry, read_staging_index},
        object::{ObjectTrait, commit::Commit, tree::Tree},
        odb::ObjectStore,
        refs,
    },
};

/// Classification of one working-directory difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Untracked,
}

/// One reported path, with the hashes on each side of the difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: String,
    pub status: FileStatus,
    pub index_hash: Option<ObjectHash>,
    pub working_hash: Option<ObjectHash>,
}

/// The three ordered groups of a status report, each sorted by path.
///
/// A tracked path appears in at most one of staged/unstaged; untracked
/// files are never in the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingDirectoryStatus {
    pub staged: Vec<StatusEntry>,
    pub unstaged: Vec<StatusEntry>,
    pub untracked: Vec<StatusEntry>,
}

impl WorkingDirectoryStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

/// Compute working-directory status.
///
/// `override_filter` is composed after each directory's `.gitignore` during
/// the untracked scan, so callers can force exclusions or re-inclusions.
/// Cancellation is observed between directories and index entries.
pub async fn working_directory_status(
    store: &ObjectStore,
    work_dir: &Path,
    override_filter: Option<PathFilter>,
    token: &CancellationToken,
) -> Result<WorkingDirectoryStatus, GitError> {
    let index_entries: Vec<StagingEntry> = read_staging_index(store.git_dir())?
        .unwrap_or_default()
        .into_iter()
        .filter(|e| e.is_plain())
        .collect();

    let head = head_snapshot(store).await?;

    let mut status = WorkingDirectoryStatus::default();
    let mut processed: HashSet<String> = HashSet::new();

    for entry in &index_entries {
        if token.is_cancelled() {
            return Err(GitError::Cancelled);
        }
        processed.insert(entry.path.clone());
        compare_entry(entry, &head, work_dir, &mut status)?;
    }

    scan_untracked(
        work_dir,
        &processed,
        override_filter.unwrap_or_else(filter::neutral),
        token,
        &mut status,
    )?;

    status.staged.sort_by(|a, b| a.path.cmp(&b.path));
    status.unstaged.sort_by(|a, b| a.path.cmp(&b.path));
    status.untracked.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(status)
}

/// Walk the `HEAD` commit's tree into a `path → blob hash` map.
///
/// Tree reads bypass the stream cache: each tree is consumed exactly once,
/// and keeping them resident would only evict hot delta bases.
async fn head_snapshot(store: &ObjectStore) -> Result<HashMap<String, ObjectHash>, GitError> {
    let mut snapshot = HashMap::new();
    let Some(head_id) = refs::resolve_head(store.git_dir())? else {
        return Ok(snapshot);
    };
    let Some((_, commit_bytes)) = store.read_object(&head_id, true).await? else {
        return Ok(snapshot);
    };
    let commit = Commit::from_bytes(&commit_bytes, head_id)?;

    let mut stack = vec![(String::new(), commit.tree_id)];
    while let Some((prefix, tree_id)) = stack.pop() {
        let Some((_, tree_bytes)) = store.read_object(&tree_id, false).await? else {
            return Err(GitError::NotFoundHashValue(tree_id.to_string()));
        };
        let tree = Tree::from_bytes(&tree_bytes, tree_id)?;
        for item in tree.tree_items {
            let path = if prefix.is_empty() {
                item.name.clone()
            } else {
                format!("{prefix}/{}", item.name)
            };
            match item.mode {
                crate::internal::object::tree::TreeItemMode::Tree => {
                    stack.push((path, item.id));
                }
                // Blobs, links and gitlinks all occupy one path slot.
                _ => {
                    snapshot.insert(path, item.id);
                }
            }
        }
    }
    Ok(snapshot)
}

/// Compare one plain index entry against HEAD and the file on disk.
fn compare_entry(
    entry: &StagingEntry,
    head: &HashMap<String, ObjectHash>,
    work_dir: &Path,
    status: &mut WorkingDirectoryStatus,
) -> Result<(), GitError> {
    let index_hash = entry.hash;
    let head_hash = head.get(&entry.path).copied();
    let disk = working_file_hash(&work_dir.join(&entry.path))?;

    let staged_kind = || {
        if head_hash.is_none() {
            FileStatus::Added
        } else {
            FileStatus::Modified
        }
    };

    match disk {
        Some(working_hash) => {
            if index_hash == working_hash {
                if head_hash == Some(index_hash) {
                    // Fully clean.
                    return Ok(());
                }
                status.staged.push(StatusEntry {
                    path: entry.path.clone(),
                    status: staged_kind(),
                    index_hash: Some(index_hash),
                    working_hash: Some(working_hash),
                });
            } else if head_hash == Some(index_hash) {
                // Only the working tree moved.
                status.unstaged.push(StatusEntry {
                    path: entry.path.clone(),
                    status: FileStatus::Modified,
                    index_hash: Some(index_hash),
                    working_hash: Some(working_hash),
                });
            } else {
                // Index differs from HEAD *and* the working tree differs
                // from the index.
                status.staged.push(StatusEntry {
                    path: entry.path.clone(),
                    status: staged_kind(),
                    index_hash: Some(index_hash),
                    working_hash: Some(working_hash),
                });
                status.unstaged.push(StatusEntry {
                    path: entry.path.clone(),
                    status: FileStatus::Modified,
                    index_hash: Some(index_hash),
                    working_hash: Some(working_hash),
                });
            }
        }
        None => {
            if head_hash != Some(index_hash) {
                status.staged.push(StatusEntry {
                    path: entry.path.clone(),
                    status: staged_kind(),
                    index_hash: Some(index_hash),
                    working_hash: None,
                });
            }
            status.unstaged.push(StatusEntry {
                path: entry.path.clone(),
                status: FileStatus::Deleted,
                index_hash: Some(index_hash),
                working_hash: None,
            });
        }
    }
    Ok(())
}

/// Blob-hash a file on disk (`sha1("blob <size>\0" + bytes)`), streaming.
/// Symlinks hash their target path, the way Git stores them. `None` when
/// the path does not exist.
fn working_file_hash(path: &Path) -> Result<Option<ObjectHash>, GitError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::IOError(e)),
    };

    if meta.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        let bytes = target.to_string_lossy().into_owned().into_bytes();
        let mut hasher = BlobHasher::new(bytes.len() as u64);
        hasher.update(&bytes);
        return Ok(Some(hasher.finalize()));
    }
    if !meta.is_file() {
        return Ok(None);
    }

    let mut hasher = BlobHasher::new(meta.len());
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut chunk = [0u8; 16 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(Some(hasher.finalize()))
}

/// One directory level pending in the untracked scan.
struct ScanFrame {
    prefix: String,
    /// Composition of ancestor `.gitignore`s, without the override.
    candidate: PathFilter,
}

/// Depth-first untracked scan with hierarchical filter composition.
///
/// Entering a directory composes the parent candidate filter with the
/// directory's `.gitignore` (candidate for children) and then the caller
/// override (the "exactly" filter deciding at this level). Unreadable
/// directories are skipped silently, matching Git's scan.
fn scan_untracked(
    work_dir: &Path,
    processed: &HashSet<String>,
    override_filter: PathFilter,
    token: &CancellationToken,
    status: &mut WorkingDirectoryStatus,
) -> Result<(), GitError> {
    let mut stack = vec![ScanFrame {
        prefix: String::new(),
        candidate: filter::neutral(),
    }];

    while let Some(frame) = stack.pop() {
        if token.is_cancelled() {
            return Err(GitError::Cancelled);
        }
        let dir = if frame.prefix.is_empty() {
            work_dir.to_path_buf()
        } else {
            work_dir.join(&frame.prefix)
        };

        let candidate = match load_gitignore(&dir, &frame.prefix)? {
            Some(local) => filter::combine(vec![frame.candidate.clone(), local]),
            None => frame.candidate.clone(),
        };
        let exactly = filter::combine(vec![candidate.clone(), override_filter.clone()]);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "untracked scan skips directory");
                continue;
            }
        };
        for entry in entries {
            let Ok(entry) = entry else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ".git" {
                continue;
            }
            let rel = if frame.prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{name}", frame.prefix)
            };

            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            // Directories carry a trailing slash into the filter so
            // dir-only patterns apply to them but not to plain files
            // sharing the name.
            let filter_path = if file_type.is_dir() {
                format!("{rel}/")
            } else {
                rel.clone()
            };
            if exactly(FilterDecision::Neutral, &filter_path) == FilterDecision::Exclude {
                continue;
            }

            if file_type.is_dir() {
                stack.push(ScanFrame {
                    prefix: rel,
                    candidate: candidate.clone(),
                });
            } else if !processed.contains(&rel) {
                if let Some(working_hash) = working_file_hash(&entry.path())? {
                    status.untracked.push(StatusEntry {
                        path: rel,
                        status: FileStatus::Untracked,
                        index_hash: None,
                        working_hash: Some(working_hash),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Load `dir/.gitignore` as a filter scoped to `prefix`, if present.
fn load_gitignore(dir: &Path, prefix: &str) -> Result<Option<PathFilter>, GitError> {
    let path = dir.join(".gitignore");
    let file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        // Unreadable ignore files are treated as absent, like Git does.
        Err(_) => return Ok(None),
    };
    let local = filter::from_gitignore_stream(BufReader::new(file))?;
    if prefix.is_empty() {
        Ok(Some(local))
    } else {
        Ok(Some(filter::scoped(prefix, local)))
    }
}

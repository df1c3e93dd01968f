//! Worktree discovery.
//!
//! The main worktree is the directory holding the canonical `<git-dir>`;
//! linked worktrees are described by `worktrees/<name>/` entries whose
//! `gitdir` file points back at the `.git` file inside the working copy.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    internal::refs::{self, RefTarget},
};

/// Name token reported for the main worktree.
pub const MAIN_WORKTREE_NAME: &str = "(main)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Normal,
    Locked,
    /// HEAD is a bare commit hash rather than a branch.
    Detached,
    /// The working directory the entry points at no longer exists.
    Prunable,
}

/// One discovered worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub name: String,
    pub path: PathBuf,
    pub status: WorktreeStatus,
    pub branch: Option<String>,
    pub is_main: bool,
}

/// Enumerate the main worktree plus every linked worktree registered under
/// `<git-dir>/worktrees`.
pub fn enumerate_worktrees(git_dir: &Path) -> Result<Vec<Worktree>, GitError> {
    let mut out = Vec::new();

    let main_path = git_dir.parent().unwrap_or(git_dir).to_path_buf();
    out.push(Worktree {
        name: MAIN_WORKTREE_NAME.to_string(),
        path: main_path,
        status: WorktreeStatus::Normal,
        branch: refs::head_branch_name(git_dir)?,
        is_main: true,
    });

    let worktrees_dir = git_dir.join("worktrees");
    let entries = match fs::read_dir(&worktrees_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(GitError::IOError(e)),
    };

    let mut linked = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(worktree) = read_linked_worktree(&entry.path())? {
            linked.push(worktree);
        }
    }
    linked.sort_by(|a, b| a.name.cmp(&b.name));
    out.extend(linked);
    Ok(out)
}

fn read_linked_worktree(admin_dir: &Path) -> Result<Option<Worktree>, GitError> {
    let name = admin_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // `gitdir` names the `.git` file inside the working copy.
    let gitdir_text = match fs::read_to_string(admin_dir.join("gitdir")) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::IOError(e)),
    };
    let git_file = PathBuf::from(gitdir_text.trim());
    let resolved = git_file.absolutize_from(admin_dir).map(|p| p.into_owned());
    let git_file = resolved.unwrap_or(git_file);
    let work_path = git_file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| git_file.clone());

    // Precedence: locked, then detached, then prunable.
    let status = if admin_dir.join("locked").exists() {
        WorktreeStatus::Locked
    } else if matches!(refs::read_head(admin_dir)?, Some(RefTarget::Direct(_))) {
        WorktreeStatus::Detached
    } else if !git_file.exists() {
        WorktreeStatus::Prunable
    } else {
        WorktreeStatus::Normal
    };

    // The linked worktree keeps its own HEAD in the admin directory.
    let branch = refs::head_branch_name(admin_dir)?;

    Ok(Some(Worktree {
        name,
        path: work_path,
        status,
        branch,
        is_main: false,
    }))
}

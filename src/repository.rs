//! The repository handle: the public entry point tying the object store,
//! ref store, status engine and worktree enumerator together.
//!
//! Both views live here: the primitive one (`object`, `open_object`)
//! returning raw typed streams, and the structured one (`commit`, `tree`,
//! `branches`, `status`, ...) returning parsed values.

use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::{
        ignore::filter::PathFilter,
        object::{
            ObjectTrait, blob::Blob, commit::Commit, tag::Tag, tree::Tree, types::ObjectType,
        },
        odb::{ObjectStore, ObjectStream},
        refs::{
            self, Branch, FetchHead, RefTarget, ReflogEntry, TagRef,
            config::{GitConfig, Remote},
        },
        status::{self, WorkingDirectoryStatus},
        worktree::{self, Worktree},
    },
};

/// How many annotated-tag hops `peel_to_commit` follows before giving up.
const MAX_TAG_PEEL_DEPTH: usize = 10;

/// One stash entry, newest first (`index` 0 is `stash@{0}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub index: usize,
    pub id: ObjectHash,
    pub message: String,
}

/// An open repository rooted at a filesystem path.
pub struct Repository {
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
    store: ObjectStore,
}

impl Repository {
    /// Open the repository at `path`.
    ///
    /// `path` may be the working directory (the `<git-dir>` then is
    /// `path/.git`, following a worktree `.git` pointer file if present),
    /// the `.git` directory itself, or a bare repository directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Repository, GitError> {
        let path = path.as_ref();
        let (git_dir, work_dir) = locate_git_dir(path)?;
        Ok(Repository {
            store: ObjectStore::new(git_dir.clone()),
            git_dir,
            work_dir,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The working directory; `None` for bare repositories.
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// Release the pack-index catalogue and cached streams. Every
    /// subsequent object access fails with [`GitError::Disposed`].
    pub async fn close(&self) {
        self.store.close().await;
    }

    // ------------------------------------------------------------------
    // Primitive view
    // ------------------------------------------------------------------

    /// Resolve an object id to its typed byte stream.
    pub async fn open_object(&self, hash: &ObjectHash) -> Result<Option<ObjectStream>, GitError> {
        self.store.open(hash, true).await
    }

    /// Resolve and materialise an object.
    pub async fn object(
        &self,
        hash: &ObjectHash,
    ) -> Result<Option<(ObjectType, Vec<u8>)>, GitError> {
        self.store.read_object(hash, true).await
    }

    // ------------------------------------------------------------------
    // Structured view
    // ------------------------------------------------------------------

    pub async fn commit(&self, hash: &ObjectHash) -> Result<Option<Commit>, GitError> {
        self.typed::<Commit>(hash, ObjectType::Commit).await
    }

    pub async fn tree(&self, hash: &ObjectHash) -> Result<Option<Tree>, GitError> {
        self.typed::<Tree>(hash, ObjectType::Tree).await
    }

    pub async fn blob(&self, hash: &ObjectHash) -> Result<Option<Blob>, GitError> {
        self.typed::<Blob>(hash, ObjectType::Blob).await
    }

    pub async fn tag(&self, hash: &ObjectHash) -> Result<Option<Tag>, GitError> {
        self.typed::<Tag>(hash, ObjectType::Tag).await
    }

    async fn typed<T: ObjectTrait>(
        &self,
        hash: &ObjectHash,
        expected: ObjectType,
    ) -> Result<Option<T>, GitError> {
        match self.store.read_object(hash, true).await? {
            Some((kind, bytes)) if kind == expected => Ok(Some(T::from_bytes(&bytes, *hash)?)),
            Some((kind, _)) => Err(GitError::InvalidObjectInfo(format!(
                "{hash} is a {kind}, expected {expected}"
            ))),
            None => Ok(None),
        }
    }

    /// Follow annotated tags until a commit is reached.
    pub async fn peel_to_commit(&self, hash: &ObjectHash) -> Result<Option<Commit>, GitError> {
        let mut current = *hash;
        for _ in 0..MAX_TAG_PEEL_DEPTH {
            match self.store.read_object(&current, true).await? {
                None => return Ok(None),
                Some((ObjectType::Commit, bytes)) => {
                    return Ok(Some(Commit::from_bytes(&bytes, current)?));
                }
                Some((ObjectType::Tag, bytes)) => {
                    current = Tag::from_bytes(&bytes, current)?.object_id;
                }
                Some((kind, _)) => {
                    return Err(GitError::InvalidObjectInfo(format!(
                        "{current} peels to a {kind}, not a commit"
                    )));
                }
            }
        }
        Err(GitError::InvalidObjectInfo(format!(
            "tag chain from {hash} exceeds {MAX_TAG_PEEL_DEPTH} hops"
        )))
    }

    // ------------------------------------------------------------------
    // Refs
    // ------------------------------------------------------------------

    pub fn head(&self) -> Result<Option<RefTarget>, GitError> {
        refs::read_head(&self.git_dir)
    }

    /// The commit `HEAD` points at, if the repository has one yet.
    pub async fn head_commit(&self) -> Result<Option<Commit>, GitError> {
        match refs::resolve_head(&self.git_dir)? {
            Some(id) => self.commit(&id).await,
            None => Ok(None),
        }
    }

    /// The current branch short name, when `HEAD` is symbolic.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        refs::head_branch_name(&self.git_dir)
    }

    pub fn branches(&self) -> Result<Vec<Branch>, GitError> {
        refs::branches(&self.git_dir)
    }

    pub fn tags(&self) -> Result<Vec<TagRef>, GitError> {
        refs::tags(&self.git_dir)
    }

    pub fn fetch_heads(&self) -> Result<Vec<FetchHead>, GitError> {
        refs::read_fetch_head(&self.git_dir)
    }

    /// The reflog of a full ref name (`HEAD`, `refs/heads/main`, ...).
    pub fn reflog(&self, ref_name: &str) -> Result<Vec<ReflogEntry>, GitError> {
        refs::read_reflog(&self.git_dir, ref_name)
    }

    /// Stashes, newest first, from the `refs/stash` reflog.
    pub fn stashes(&self) -> Result<Vec<StashEntry>, GitError> {
        let log = refs::read_reflog(&self.git_dir, "refs/stash")?;
        Ok(log
            .into_iter()
            .rev()
            .enumerate()
            .map(|(index, entry)| StashEntry {
                index,
                id: entry.new_id,
                message: entry.message,
            })
            .collect())
    }

    pub fn config(&self) -> Result<GitConfig, GitError> {
        GitConfig::read(&self.git_dir)
    }

    pub fn remotes(&self) -> Result<Vec<Remote>, GitError> {
        Ok(self.config()?.remotes())
    }

    // ------------------------------------------------------------------
    // Working directory
    // ------------------------------------------------------------------

    /// Working-directory status with default filtering.
    pub async fn status(&self) -> Result<WorkingDirectoryStatus, GitError> {
        self.status_with(None, &CancellationToken::new()).await
    }

    /// Working-directory status with a caller-supplied override filter and
    /// cancellation token.
    pub async fn status_with(
        &self,
        override_filter: Option<PathFilter>,
        token: &CancellationToken,
    ) -> Result<WorkingDirectoryStatus, GitError> {
        let work_dir = self.work_dir.as_deref().ok_or_else(|| {
            GitError::IOError(io::Error::new(
                io::ErrorKind::NotFound,
                "bare repository has no working directory",
            ))
        })?;
        status::working_directory_status(&self.store, work_dir, override_filter, token).await
    }

    pub fn worktrees(&self) -> Result<Vec<Worktree>, GitError> {
        worktree::enumerate_worktrees(&self.git_dir)
    }
}

/// Locate `<git-dir>` and the working directory for `path`.
fn locate_git_dir(path: &Path) -> Result<(PathBuf, Option<PathBuf>), GitError> {
    let not_a_repo = || {
        GitError::IOError(io::Error::new(
            io::ErrorKind::NotFound,
            format!("`{}` is not a git repository", path.display()),
        ))
    };

    if !path.exists() {
        return Err(not_a_repo());
    }

    // Opened the `.git` directory directly.
    if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
        let work_dir = path.parent().map(|p| p.to_path_buf());
        return Ok((path.to_path_buf(), work_dir));
    }

    let dot_git = path.join(".git");
    if dot_git.is_dir() {
        return Ok((dot_git, Some(path.to_path_buf())));
    }
    if dot_git.is_file() {
        // Linked worktree: `.git` is a pointer file `gitdir: <path>`.
        let text = std::fs::read_to_string(&dot_git)?;
        let target = text
            .trim()
            .strip_prefix("gitdir:")
            .map(|t| t.trim())
            .ok_or_else(not_a_repo)?;
        let git_dir = path.join(target);
        let git_dir = std::fs::canonicalize(&git_dir).unwrap_or(git_dir);
        return Ok((git_dir, Some(path.to_path_buf())));
    }

    // Bare repository: the directory itself carries the object store.
    if path.join("objects").is_dir() && path.join("HEAD").is_file() {
        return Ok((path.to_path_buf(), None));
    }
    Err(not_a_repo())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::Repository;
    use crate::{
        errors::GitError,
        hash::ObjectHash,
        internal::{
            object::types::ObjectType,
            odb::loose::tests::write_loose_object,
            refs::tests::write_ref,
            worktree::MAIN_WORKTREE_NAME,
        },
    };

    fn init_repo(root: &Path) -> std::path::PathBuf {
        let git_dir = root.join(".git");
        std::fs::create_dir_all(git_dir.join("objects")).unwrap();
        write_ref(&git_dir, "HEAD", "ref: refs/heads/main\n");
        git_dir
    }

    /// Write a root commit of the given files; returns the commit id.
    fn seed_commit(git_dir: &Path, files: &[(&str, &[u8])]) -> ObjectHash {
        let mut tree_data = Vec::new();
        for (name, body) in files {
            let blob = write_loose_object(git_dir, ObjectType::Blob, body);
            tree_data.extend_from_slice(b"100644 ");
            tree_data.extend_from_slice(name.as_bytes());
            tree_data.push(0);
            tree_data.extend_from_slice(blob.as_ref());
        }
        let tree_id = write_loose_object(git_dir, ObjectType::Tree, &tree_data);
        let commit_body = format!(
            "tree {tree_id}\nauthor A <a@b.c> 1700000000 +0000\ncommitter A <a@b.c> 1700000000 +0000\n\nseed\n"
        );
        let commit_id = write_loose_object(git_dir, ObjectType::Commit, commit_body.as_bytes());
        write_ref(git_dir, "refs/heads/main", &format!("{commit_id}\n"));
        commit_id
    }

    #[tokio::test]
    async fn test_open_and_head_commit() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        let commit_id = seed_commit(&git_dir, &[("README.md", b"hi\n")]);

        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.git_dir(), git_dir.as_path());
        assert_eq!(repo.work_dir(), Some(dir.path()));
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));

        let head = repo.head_commit().await.unwrap().unwrap();
        assert_eq!(head.id, commit_id);
        assert_eq!(head.message.trim(), "seed");

        // Structured tree traversal from the commit.
        let tree = repo.tree(&head.tree_id).await.unwrap().unwrap();
        assert_eq!(tree.tree_items.len(), 1);
        assert_eq!(tree.tree_items[0].name, "README.md");
        let blob = repo.blob(&tree.tree_items[0].id).await.unwrap().unwrap();
        assert_eq!(blob.data, b"hi\n");
    }

    #[tokio::test]
    async fn test_open_git_dir_directly() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        let repo = Repository::open(&git_dir).unwrap();
        assert_eq!(repo.git_dir(), git_dir.as_path());
        assert_eq!(repo.work_dir(), Some(dir.path()));
    }

    #[test]
    fn test_open_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Repository::open(dir.path().join("nope")).is_err());
        // An empty directory is not a repository either.
        assert!(Repository::open(dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        let commit_id = seed_commit(&git_dir, &[("f", b"x")]);

        let repo = Repository::open(dir.path()).unwrap();
        assert!(matches!(
            repo.tree(&commit_id).await,
            Err(GitError::InvalidObjectInfo(_))
        ));
    }

    #[tokio::test]
    async fn test_peel_annotated_tag() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        let commit_id = seed_commit(&git_dir, &[("f", b"x")]);

        let tag_body = format!(
            "object {commit_id}\ntype commit\ntag v1\ntagger A <a@b.c> 1700000000 +0000\n\nrelease\n"
        );
        let tag_id = write_loose_object(&git_dir, ObjectType::Tag, tag_body.as_bytes());

        let repo = Repository::open(dir.path()).unwrap();
        let peeled = repo.peel_to_commit(&tag_id).await.unwrap().unwrap();
        assert_eq!(peeled.id, commit_id);

        let tag = repo.tag(&tag_id).await.unwrap().unwrap();
        assert_eq!(tag.tag_name, "v1");
    }

    #[tokio::test]
    async fn test_stashes_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        seed_commit(&git_dir, &[("f", b"x")]);
        let a = "1205dc34ce48bda28fc543daaf9525a9bb6e6d10";
        let b = "5462bf28fdc4681762057cac7704730b1c590b38";
        let zero = "0000000000000000000000000000000000000000";
        write_ref(
            &git_dir,
            "logs/refs/stash",
            &format!(
                "{zero} {a} A <a@b.c> 1 +0000\tWIP on main: first\n{a} {b} A <a@b.c> 2 +0000\tWIP on main: second\n"
            ),
        );

        let repo = Repository::open(dir.path()).unwrap();
        let stashes = repo.stashes().unwrap();
        assert_eq!(stashes.len(), 2);
        assert_eq!(stashes[0].index, 0);
        assert_eq!(stashes[0].id, b.parse().unwrap());
        assert_eq!(stashes[0].message, "WIP on main: second");
        assert_eq!(stashes[1].id, a.parse().unwrap());
    }

    #[tokio::test]
    async fn test_worktrees_from_repository() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        seed_commit(&git_dir, &[("f", b"x")]);

        let repo = Repository::open(dir.path()).unwrap();
        let trees = repo.worktrees().unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].name, MAIN_WORKTREE_NAME);
        assert!(trees[0].is_main);
    }

    #[tokio::test]
    async fn test_close_disposes() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        let commit_id = seed_commit(&git_dir, &[("f", b"x")]);

        let repo = Repository::open(dir.path()).unwrap();
        repo.close().await;
        assert!(matches!(
            repo.commit(&commit_id).await,
            Err(GitError::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_status_through_facade() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = init_repo(dir.path());
        seed_commit(&git_dir, &[]);
        crate::internal::index::tests::write_index_file(&git_dir, &[]);
        std::fs::write(dir.path().join("loose.txt"), b"x").unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let status = repo.status().await.unwrap();
        assert_eq!(status.untracked.len(), 1);
        assert_eq!(status.untracked[0].path, "loose.txt");
    }
}

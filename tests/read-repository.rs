//! Integration tests that fabricate a repository on disk (loose objects,
//! refs, index, ignore files, worktrees) and traverse it through the
//! public `Repository` API.

use std::{io::Write, path::Path, path::PathBuf};

use flate2::{Compression, write::ZlibEncoder};
use git_traverse::{
    hash::ObjectHash,
    internal::{object::types::ObjectType, status::FileStatus, worktree::MAIN_WORKTREE_NAME},
    repository::Repository,
};

/// Write one loose object and return its id.
fn write_loose(git_dir: &Path, kind: ObjectType, body: &[u8]) -> ObjectHash {
    let hash = ObjectHash::from_type_and_data(kind, body);
    let hex = hash.to_string();
    let dir = git_dir.join("objects").join(&hex[..2]);
    std::fs::create_dir_all(&dir).unwrap();

    let mut plain = Vec::new();
    plain.extend_from_slice(kind.to_bytes());
    plain.push(b' ');
    plain.extend_from_slice(body.len().to_string().as_bytes());
    plain.push(0);
    plain.extend_from_slice(body);
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&plain).unwrap();
    std::fs::write(dir.join(&hex[2..]), enc.finish().unwrap()).unwrap();
    hash
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A v2 index image holding the given plain `(path, hash)` entries.
fn write_index(git_dir: &Path, entries: &[(&str, ObjectHash)]) {
    let mut out = Vec::new();
    out.extend_from_slice(b"DIRC");
    out.extend_from_slice(&2u32.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (path, hash) in entries {
        let start = out.len();
        for _ in 0..10 {
            out.extend_from_slice(&0u32.to_be_bytes());
        }
        out.extend_from_slice(hash.as_ref());
        out.extend_from_slice(&(path.len() as u16).to_be_bytes());
        out.extend_from_slice(path.as_bytes());
        let used = out.len() - start;
        let padded = (used + 8) & !7;
        out.resize(out.len() + (padded - used), 0);
    }
    out.extend_from_slice(&[0u8; 20]);
    std::fs::write(git_dir.join("index"), out).unwrap();
}

/// A repository with one commit: README.md + src/lib.rs.
fn seed_repository(root: &Path) -> (PathBuf, ObjectHash, ObjectHash, ObjectHash) {
    let git_dir = root.join(".git");
    std::fs::create_dir_all(git_dir.join("objects")).unwrap();

    let readme = write_loose(&git_dir, ObjectType::Blob, b"# demo\n");
    let lib_rs = write_loose(&git_dir, ObjectType::Blob, b"pub fn demo() {}\n");

    let mut src_tree = Vec::new();
    src_tree.extend_from_slice(b"100644 lib.rs\x00");
    src_tree.extend_from_slice(lib_rs.as_ref());
    let src_id = write_loose(&git_dir, ObjectType::Tree, &src_tree);

    let mut root_tree = Vec::new();
    root_tree.extend_from_slice(b"100644 README.md\x00");
    root_tree.extend_from_slice(readme.as_ref());
    root_tree.extend_from_slice(b"40000 src\x00");
    root_tree.extend_from_slice(src_id.as_ref());
    let tree_id = write_loose(&git_dir, ObjectType::Tree, &root_tree);

    let commit_body = format!(
        "tree {tree_id}\nauthor Eli Ma <genedna@gmail.com> 1678101573 +0800\ncommitter Eli Ma <genedna@gmail.com> 1678101573 +0800\n\nInitial commit\n"
    );
    let commit_id = write_loose(&git_dir, ObjectType::Commit, commit_body.as_bytes());

    write_file(&git_dir, "HEAD", "ref: refs/heads/main\n");
    write_file(&git_dir, "refs/heads/main", &format!("{commit_id}\n"));

    write_file(root, "README.md", "# demo\n");
    write_file(root, "src/lib.rs", "pub fn demo() {}\n");
    write_index(&git_dir, &[("README.md", readme), ("src/lib.rs", lib_rs)]);

    (git_dir, commit_id, readme, lib_rs)
}

/// Loose commit lookup: type and body prefix round-trip through the
/// primitive view.
#[tokio::test]
async fn loose_commit_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let (_, commit_id, ..) = seed_repository(dir.path());

    let repo = Repository::open(dir.path()).unwrap();
    let (kind, bytes) = repo.object(&commit_id).await.unwrap().unwrap();
    assert_eq!(kind, ObjectType::Commit);
    assert!(bytes.starts_with(b"tree "));

    let commit = repo.commit(&commit_id).await.unwrap().unwrap();
    assert_eq!(commit.author.name, "Eli Ma");
    assert_eq!(commit.format_message(), "Initial commit");
}

/// Structured traversal: commit → tree → subtree → blob.
#[tokio::test]
async fn structured_tree_walk() {
    let dir = tempfile::tempdir().unwrap();
    let (_, commit_id, _, lib_rs) = seed_repository(dir.path());

    let repo = Repository::open(dir.path()).unwrap();
    let commit = repo.commit(&commit_id).await.unwrap().unwrap();
    let root = repo.tree(&commit.tree_id).await.unwrap().unwrap();
    let src = root.tree_items.iter().find(|i| i.name == "src").unwrap();
    let src_tree = repo.tree(&src.id).await.unwrap().unwrap();
    assert_eq!(src_tree.tree_items[0].name, "lib.rs");
    assert_eq!(src_tree.tree_items[0].id, lib_rs);

    let blob = repo.blob(&lib_rs).await.unwrap().unwrap();
    assert_eq!(blob.data, b"pub fn demo() {}\n");
}

/// Clean repo plus one modification and one untracked file: the status
/// report groups them correctly with both hashes populated.
#[tokio::test]
async fn working_directory_status() {
    let dir = tempfile::tempdir().unwrap();
    let (..) = seed_repository(dir.path());

    write_file(dir.path(), "README.md", "# demo v2\n");
    write_file(dir.path(), "new.txt", "fresh\n");

    let repo = Repository::open(dir.path()).unwrap();
    let status = repo.status().await.unwrap();

    assert!(status.staged.is_empty());
    assert_eq!(status.unstaged.len(), 1);
    assert_eq!(status.unstaged[0].path, "README.md");
    assert_eq!(status.unstaged[0].status, FileStatus::Modified);
    assert!(status.unstaged[0].index_hash.is_some());
    assert!(status.unstaged[0].working_hash.is_some());
    assert_ne!(status.unstaged[0].index_hash, status.unstaged[0].working_hash);

    assert_eq!(status.untracked.len(), 1);
    assert_eq!(status.untracked[0].path, "new.txt");
    assert_eq!(status.untracked[0].status, FileStatus::Untracked);
    assert!(status.untracked[0].index_hash.is_none());
    assert!(status.untracked[0].working_hash.is_some());
}

/// `.gitignore` keeps noise out of the untracked listing.
#[tokio::test]
async fn gitignored_untracked_files() {
    let dir = tempfile::tempdir().unwrap();
    seed_repository(dir.path());

    write_file(dir.path(), ".gitignore", "*.log\ntarget/\n");
    write_file(dir.path(), "debug.log", "noise");
    write_file(dir.path(), "target/debug/app", "bin");
    write_file(dir.path(), "notes.txt", "keep me");

    let repo = Repository::open(dir.path()).unwrap();
    let status = repo.status().await.unwrap();
    let untracked: Vec<&str> = status.untracked.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(untracked, vec![".gitignore", "notes.txt"]);
}

/// Branch and tag enumeration across loose and packed refs.
#[tokio::test]
async fn refs_enumeration() {
    let dir = tempfile::tempdir().unwrap();
    let (git_dir, commit_id, ..) = seed_repository(dir.path());

    write_file(&git_dir, "refs/heads/feature/x", &format!("{commit_id}\n"));
    write_file(
        &git_dir,
        "packed-refs",
        &format!("# pack-refs with: peeled \n{commit_id} refs/tags/v0.1.0\n"),
    );

    let repo = Repository::open(dir.path()).unwrap();
    let branch_names: Vec<String> = repo
        .branches()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert!(branch_names.contains(&"main".to_string()));
    assert!(branch_names.contains(&"feature/x".to_string()));

    let tags = repo.tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "v0.1.0");
    assert_eq!(tags[0].id, commit_id);
}

/// Main worktree plus one linked worktree on a feature branch.
#[tokio::test]
async fn worktree_enumeration() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");
    std::fs::create_dir_all(&root).unwrap();
    let (git_dir, commit_id, ..) = seed_repository(&root);
    write_file(&git_dir, "refs/heads/feature1", &format!("{commit_id}\n"));

    let wt_dir = dir.path().join("wt1");
    std::fs::create_dir_all(&wt_dir).unwrap();
    let admin = git_dir.join("worktrees/wt1");
    write_file(&admin, "gitdir", &format!("{}\n", wt_dir.join(".git").display()));
    write_file(&wt_dir, ".git", &format!("gitdir: {}\n", admin.display()));
    write_file(&admin, "HEAD", "ref: refs/heads/feature1\n");

    let repo = Repository::open(&root).unwrap();
    let trees = repo.worktrees().unwrap();
    assert_eq!(trees.len(), 2);

    assert_eq!(trees[0].name, MAIN_WORKTREE_NAME);
    assert!(trees[0].is_main);
    assert_eq!(trees[0].branch.as_deref(), Some("main"));

    assert_eq!(trees[1].name, "wt1");
    assert!(!trees[1].is_main);
    assert_eq!(trees[1].branch.as_deref(), Some("feature1"));
    assert_eq!(trees[1].path, wt_dir);
}

/// Reflog-backed history: HEAD log and stash listing.
#[tokio::test]
async fn reflog_and_stashes() {
    let dir = tempfile::tempdir().unwrap();
    let (git_dir, commit_id, ..) = seed_repository(dir.path());
    let zero = "0000000000000000000000000000000000000000";
    write_file(
        &git_dir,
        "logs/HEAD",
        &format!("{zero} {commit_id} Eli Ma <genedna@gmail.com> 1678101573 +0800\tcommit (initial): Initial commit\n"),
    );
    write_file(
        &git_dir,
        "logs/refs/stash",
        &format!("{zero} {commit_id} Eli Ma <genedna@gmail.com> 1678101600 +0800\tWIP on main: stash one\n"),
    );

    let repo = Repository::open(dir.path()).unwrap();
    let log = repo.reflog("HEAD").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].new_id, commit_id);
    assert_eq!(log[0].message, "commit (initial): Initial commit");

    let stashes = repo.stashes().unwrap();
    assert_eq!(stashes.len(), 1);
    assert_eq!(stashes[0].index, 0);
    assert_eq!(stashes[0].message, "WIP on main: stash one");
}

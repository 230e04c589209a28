//! Git fixtures.
//!
//! Tests never reach the network: ssh-style remote URLs are rewritten to a
//! local bare repository with `url.<base>.insteadOf`.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs `git` with `args` in `cwd` and returns trimmed stdout.
///
/// # Panics
/// Panics if git cannot be launched or exits unsuccessfully.
pub fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .unwrap_or_else(|e| panic!("git: failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "git: `git {args:?}` failed in {}:\n{}",
            cwd.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a bare repository at `path` to act as the push target.
///
/// # Panics
/// Panics if the repository cannot be created.
pub fn bare_remote(path: &Path) -> PathBuf {
    git2::Repository::init_bare(path).unwrap_or_else(|e| {
        panic!(
            "bare_remote: failed to init bare repository at {}: {e}",
            path.display()
        )
    });
    path.to_path_buf()
}

/// Points `ssh_url` at the local bare repository for the store at
/// `store_root`, and disables commit signing there.
///
/// Call after the store has been initialized.
pub fn redirect_remote(store_root: &Path, ssh_url: &str, bare: &Path) {
    let key = format!("url.{}.insteadOf", bare.display());
    git(store_root, &["config", &key, ssh_url]);
    git(store_root, &["config", "commit.gpgsign", "false"]);
}

/// Number of commits reachable from HEAD; zero for an unborn branch.
pub fn commit_count(repo_path: &Path) -> usize {
    let repo = git2::Repository::open(repo_path)
        .unwrap_or_else(|e| panic!("commit_count: cannot open {}: {e}", repo_path.display()));
    let Ok(head) = repo.head() else {
        return 0;
    };
    let Some(oid) = head.target() else {
        return 0;
    };
    let mut walk = repo.revwalk().expect("commit_count: revwalk");
    walk.push(oid).expect("commit_count: push head");
    walk.count()
}

/// Id of `branch` in the (bare or regular) repository at `repo_path`.
pub fn branch_tip(repo_path: &Path, branch: &str) -> Option<String> {
    let repo = git2::Repository::open(repo_path).ok()?;
    let reference = repo.find_reference(&format!("refs/heads/{branch}")).ok()?;
    reference.target().map(|oid| oid.to_string())
}

/// Whether the working tree of `repo_path` has uncommitted changes.
pub fn is_dirty(repo_path: &Path) -> bool {
    !git(repo_path, &["status", "--porcelain"]).is_empty()
}

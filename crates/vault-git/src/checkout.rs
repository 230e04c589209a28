//! Extraction of a single subtree from a commit into a plain directory.
//!
//! Writes only into the destination; the store's working tree and index are
//! never touched.

use std::fs;
use std::path::Path;

use git2::{ObjectType, Repository, Tree};

use crate::{Error, Result};

const MODE_LINK: i32 = 0o120000;
const MODE_EXEC: i32 = 0o100755;

/// Write the subtree at `subtree` of `commit_id` into `dest`.
///
/// Returns the number of files and links written.
pub fn checkout_subtree(
    repo: &Repository,
    commit_id: &str,
    subtree: &str,
    dest: &Path,
) -> Result<usize> {
    let tree = find_subtree(repo, commit_id, subtree)?.ok_or_else(|| Error::SubtreeNotFound {
        commit: commit_id.to_string(),
        path: subtree.to_string(),
    })?;

    let mut written = 0;
    write_tree(repo, &tree, dest, &mut written)?;
    tracing::debug!(commit = %commit_id, subtree, files = written, dest = %dest.display(), "Extracted subtree");
    Ok(written)
}

/// Look up `subtree` in the commit's tree; `None` if absent or not a directory.
pub fn find_subtree<'r>(
    repo: &'r Repository,
    commit_id: &str,
    subtree: &str,
) -> Result<Option<Tree<'r>>> {
    let oid = git2::Oid::from_str(commit_id).map_err(|_| Error::RefNotFound {
        reference: commit_id.to_string(),
    })?;
    let commit = repo.find_commit(oid).map_err(|_| Error::RefNotFound {
        reference: commit_id.to_string(),
    })?;
    let root = commit.tree()?;

    let trimmed = subtree.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Some(root));
    }

    let entry = match root.get_path(Path::new(trimmed)) {
        Ok(entry) => entry,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if entry.kind() != Some(ObjectType::Tree) {
        return Ok(None);
    }
    Ok(Some(repo.find_tree(entry.id())?))
}

fn write_tree(repo: &Repository, tree: &Tree<'_>, dest: &Path, written: &mut usize) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| vault_fs::Error::io(dest, e))?;

    for entry in tree.iter() {
        let Some(name) = entry.name() else {
            tracing::warn!("Skipping tree entry with a non UTF-8 name");
            continue;
        };
        if name == "." || name == ".." || name.contains('/') {
            return Err(Error::UnsafeTreeEntry {
                name: name.to_string(),
            });
        }
        let target = dest.join(name);

        match entry.kind() {
            Some(ObjectType::Tree) => {
                let sub = repo.find_tree(entry.id())?;
                write_tree(repo, &sub, &target, written)?;
            }
            Some(ObjectType::Blob) => {
                let blob = repo.find_blob(entry.id())?;
                write_blob(&target, blob.content(), entry.filemode())?;
                *written += 1;
            }
            _ => {
                tracing::debug!(entry = name, "Skipping non-file tree entry");
            }
        }
    }

    Ok(())
}

fn write_blob(target: &Path, content: &[u8], mode: i32) -> Result<()> {
    if mode == MODE_LINK {
        return write_link(target, content);
    }

    fs::write(target, content).map_err(|e| vault_fs::Error::io(target, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = if mode == MODE_EXEC { 0o755 } else { 0o644 };
        fs::set_permissions(target, fs::Permissions::from_mode(perms))
            .map_err(|e| vault_fs::Error::io(target, e))?;
    }

    Ok(())
}

#[cfg(unix)]
fn write_link(target: &Path, content: &[u8]) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let link_target = Path::new(OsStr::from_bytes(content));
    std::os::unix::fs::symlink(link_target, target).map_err(|e| vault_fs::Error::io(target, e))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_link(target: &Path, content: &[u8]) -> Result<()> {
    // Materialize the link as a plain file holding its target
    fs::write(target, content).map_err(|e| vault_fs::Error::io(target, e))?;
    Ok(())
}

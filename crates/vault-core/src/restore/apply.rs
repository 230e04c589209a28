//! Live-tree replacement for restore

use std::fs;
use std::path::{Path, PathBuf};

use vault_fs::{ExcludeSet, Mirror, timestamped_sibling};

use crate::Result;

/// Copy `live` to `<live>.backup_<stamp>`, choosing a free name.
pub fn backup_live(live: &Path, stamp: &str) -> Result<PathBuf> {
    let target = free_sibling(live, "backup", stamp);
    let stats = Mirror::exact().sync(live, &target)?;
    tracing::info!(
        path = %live.display(),
        backup = %target.display(),
        files = stats.files,
        "Saved safety copy of live directory"
    );
    Ok(target)
}

/// Replace `live` with the contents of `snapshot`.
///
/// A staging sibling is built from a copy of the live tree with the snapshot
/// delete-synced over it, so entries matched by `excludes` survive along
/// with links that point outside the tree. Files that already exist keep
/// their permission bits. The
/// staging tree is then swapped into place with two renames. When renaming
/// is impossible the snapshot is delete-synced onto the live tree directly.
pub fn apply_snapshot(live: &Path, snapshot: &Path, excludes: &ExcludeSet, stamp: &str) -> Result<usize> {
    let staging = free_sibling(live, "restore", stamp);
    let live_exists = live.exists();

    let staged = stage(live, live_exists, snapshot, &staging, excludes);
    let files = match staged {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(path = %live.display(), error = %e, "Staging failed, restoring in place");
            remove_quietly(&staging);
            return in_place(live, snapshot, excludes);
        }
    };

    if !live_exists {
        if let Some(parent) = live.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::rename(&staging, live).is_ok() {
            return Ok(files);
        }
        remove_quietly(&staging);
        return in_place(live, snapshot, excludes);
    }

    let retired = free_sibling(live, "replaced", stamp);
    if let Err(e) = fs::rename(live, &retired) {
        tracing::warn!(path = %live.display(), error = %e, "Cannot move live tree aside, restoring in place");
        remove_quietly(&staging);
        return in_place(live, snapshot, excludes);
    }

    if let Err(e) = fs::rename(&staging, live) {
        tracing::warn!(path = %live.display(), error = %e, "Swap failed, putting live tree back");
        fs::rename(&retired, live)?;
        remove_quietly(&staging);
        return in_place(live, snapshot, excludes);
    }

    if let Err(e) = fs::remove_dir_all(&retired) {
        tracing::warn!(path = %retired.display(), error = %e, "Could not remove replaced tree");
    }
    tracing::debug!(path = %live.display(), files, "Swapped restored tree into place");
    Ok(files)
}

fn stage(live: &Path, live_exists: bool, snapshot: &Path, staging: &Path, excludes: &ExcludeSet) -> Result<usize> {
    if live_exists {
        Mirror::exact().sync(live, staging)?;
    }
    let stats = Mirror::new(excludes.clone())
        .keep_existing_modes()
        .sync(snapshot, staging)?;
    Ok(stats.files)
}

fn in_place(live: &Path, snapshot: &Path, excludes: &ExcludeSet) -> Result<usize> {
    let stats = Mirror::new(excludes.clone())
        .keep_existing_modes()
        .sync(snapshot, live)?;
    Ok(stats.files)
}

fn free_sibling(path: &Path, label: &str, stamp: &str) -> PathBuf {
    let base = timestamped_sibling(path, label, stamp);
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| timestamped_sibling(path, label, &format!("{stamp}_{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

fn remove_quietly(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_dir_all(path)
    {
        tracing::warn!(path = %path.display(), error = %e, "Could not remove staging directory");
    }
}

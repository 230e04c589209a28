//! Advisory lock guarding store mutation
//!
//! Snapshot (mirror → stage → commit → push) and restore (extract → apply)
//! sequences each hold a [`StoreLock`] for their whole duration, so two
//! independently launched commands can never interleave on the same store.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Name of the lock file at the store root; kept out of commits.
pub const LOCK_FILE_NAME: &str = ".confvault.lock";

/// An exclusive advisory lock held until dropped.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Try to take the lock without waiting.
    ///
    /// Fails with [`Error::LockHeld`] when another process holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self::locked(file, path)),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::LockHeld {
                path: path.to_path_buf(),
            }),
            Err(_) => Err(Error::LockFailed {
                path: path.to_path_buf(),
            }),
        }
    }

    fn locked(mut file: File, path: &Path) -> Self {
        // Owner pid is informational only
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        tracing::debug!(path = %path.display(), "Acquired store lock");
        Self {
            file,
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        } else {
            tracing::debug!(path = %self.path.display(), "Released store lock");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| Error::io(path, e))
}

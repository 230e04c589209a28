//! Delete-sync mirroring of directory trees
//!
//! [`Mirror::sync`] makes a destination tree an exact copy of a source tree:
//! new and modified files are copied, entries missing from the source are
//! deleted from the destination. Exclusions apply in both directions, so an
//! excluded entry is neither copied nor deleted (it is protected in the
//! destination, like `rsync --delete --exclude`).
//!
//! Safety rules:
//! - symlinks are never followed; a link is reproduced only when its target
//!   is relative and stays inside the source root, all others are skipped
//!   (an [`Mirror::exact`] copy reproduces every link as-is);
//! - device nodes, FIFOs and sockets are never copied;
//! - entries that cannot be read are skipped and their destination
//!   counterparts are protected from deletion.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::checksum::files_identical;
use crate::{Error, ExcludeSet, Result};

/// Counters describing what a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Regular files and links present in the destination after the sync
    pub files: usize,
    /// Files and links written because they were new or different
    pub copied: usize,
    /// Destination entries removed because they vanished from the source
    pub deleted: usize,
    /// Files already identical in the destination
    pub unchanged: usize,
    /// Symlinks skipped because their target is absolute or escapes the root
    pub unsafe_links: usize,
    /// Device nodes, FIFOs and sockets that were not copied
    pub special_files: usize,
    /// Entries skipped because they could not be read or written
    pub errors: usize,
}

impl MirrorStats {
    /// Whether the destination was modified.
    pub fn changed(&self) -> bool {
        self.copied > 0 || self.deleted > 0
    }
}

/// Delete-sync mirror honoring an exclude set.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    excludes: ExcludeSet,
    all_links: bool,
    keep_modes: bool,
}

impl Mirror {
    pub fn new(excludes: ExcludeSet) -> Self {
        Self {
            excludes,
            ..Self::default()
        }
    }

    /// Copy of a local tree that reproduces every symlink as-is, wherever it
    /// points. Used for copies that never leave the host.
    pub fn exact() -> Self {
        Self {
            all_links: true,
            ..Self::default()
        }
    }

    /// Leave the permission bits of entries already in the destination
    /// alone; only new entries take the source's mode.
    pub fn keep_existing_modes(mut self) -> Self {
        self.keep_modes = true;
        self
    }

    /// Make `dst` an exact mirror of the directory `src`.
    pub fn sync(&self, src: &Path, dst: &Path) -> Result<MirrorStats> {
        let src_meta = fs::metadata(src).map_err(|e| Error::io(src, e))?;
        if !src_meta.is_dir() {
            return Err(Error::invalid_path(src, "mirror source must be a directory"));
        }
        // Reading the root up front turns an unreadable source into a hard
        // error instead of an empty mirror that would delete everything.
        fs::read_dir(src).map_err(|e| Error::io(src, e))?;

        let dst_existed = fs::symlink_metadata(dst).is_ok_and(|m| m.is_dir());
        prepare_dir(dst)?;
        if !(self.keep_modes && dst_existed) {
            fs::set_permissions(dst, src_meta.permissions()).map_err(|e| Error::io(dst, e))?;
        }

        let mut stats = MirrorStats::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut protected: Vec<PathBuf> = Vec::new();

        let walker = WalkDir::new(src)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match entry.path().strip_prefix(src) {
                Ok(rel) => !self.excludes.is_excluded(rel),
                Err(_) => false,
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if let Some(rel) = err.path().and_then(|p| p.strip_prefix(src).ok()) {
                        protected.push(rel.to_path_buf());
                    }
                    tracing::warn!(error = %err, "Skipping unreadable entry while mirroring");
                    stats.errors += 1;
                    continue;
                }
            };

            let rel = match entry.path().strip_prefix(src) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            let target = dst.join(&rel);
            let file_type = entry.file_type();

            let outcome = if file_type.is_dir() {
                sync_dir(entry.path(), &target, self.keep_modes).map(|_| Synced::Dir)
            } else if file_type.is_file() {
                sync_file(entry.path(), &target, self.keep_modes)
            } else if file_type.is_symlink() {
                sync_link(entry.path(), &rel, &target, self.all_links)
            } else {
                Ok(Synced::Special)
            };

            match outcome {
                Ok(Synced::Dir) => {
                    seen.insert(rel);
                }
                Ok(Synced::Copied) => {
                    stats.copied += 1;
                    stats.files += 1;
                    seen.insert(rel);
                }
                Ok(Synced::Unchanged) => {
                    stats.unchanged += 1;
                    stats.files += 1;
                    seen.insert(rel);
                }
                Ok(Synced::UnsafeLink) => {
                    tracing::warn!(path = %entry.path().display(), "Refusing to mirror unsafe symlink");
                    stats.unsafe_links += 1;
                }
                Ok(Synced::Special) => {
                    tracing::debug!(path = %entry.path().display(), "Skipping special file");
                    stats.special_files += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "Failed to mirror entry");
                    stats.errors += 1;
                    protected.push(rel);
                }
            }
        }

        stats.deleted = self.delete_extraneous(dst, &seen, &protected)?;
        Ok(stats)
    }

    /// Remove destination entries that have no counterpart in the source.
    fn delete_extraneous(
        &self,
        dst: &Path,
        seen: &HashSet<PathBuf>,
        protected: &[PathBuf],
    ) -> Result<usize> {
        let mut deleted = 0;

        let walker = WalkDir::new(dst)
            .follow_links(false)
            .min_depth(1)
            .contents_first(true);

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dst).to_path_buf();
                Error::io(path, e.into_io_error().unwrap_or_else(|| io::Error::other("walk failed")))
            })?;
            let Ok(rel) = entry.path().strip_prefix(dst) else {
                continue;
            };

            if seen.contains(rel)
                || self.excludes.is_excluded(rel)
                || protected.iter().any(|p| rel.starts_with(p))
                || self.never_mirrored(entry.path(), rel)
            {
                continue;
            }

            if entry.file_type().is_dir() {
                // Directories holding protected entries stay in place
                match fs::remove_dir(entry.path()) {
                    Ok(()) => deleted += 1,
                    Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {}
                    Err(e) => return Err(Error::io(entry.path(), e)),
                }
            } else {
                fs::remove_file(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}

impl Mirror {
    /// A link this mirror would refuse to create can never have a source
    /// counterpart, so it is left where it is.
    fn never_mirrored(&self, path: &Path, rel: &Path) -> bool {
        !self.all_links
            && fs::read_link(path).is_ok_and(|target| !link_stays_inside(rel, &target))
    }
}

enum Synced {
    Dir,
    Copied,
    Unchanged,
    UnsafeLink,
    Special,
}

/// Ensure `path` is a real directory, replacing any file or link in the way.
fn prepare_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
            fs::create_dir_all(path).map_err(|e| Error::io(path, e))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| Error::io(path, e))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Remove whatever occupies `path` so a different kind of entry can take its place.
fn clear_slot(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn sync_dir(src: &Path, dst: &Path, keep_mode: bool) -> io::Result<()> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => {
            if keep_mode {
                return Ok(());
            }
        }
        Ok(_) => {
            fs::remove_file(dst)?;
            fs::create_dir(dst)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dst)?,
        Err(e) => return Err(e),
    }
    let perms = fs::metadata(src)?.permissions();
    fs::set_permissions(dst, perms)
}

fn sync_file(src: &Path, dst: &Path, keep_mode: bool) -> io::Result<Synced> {
    let existing = fs::symlink_metadata(dst).ok().filter(|meta| meta.is_file());
    let perms = match existing {
        Some(ref meta) if keep_mode => meta.permissions(),
        _ => fs::metadata(src)?.permissions(),
    };

    if let Some(ref meta) = existing
        && files_identical(src, dst)?
    {
        if meta.permissions() == perms {
            return Ok(Synced::Unchanged);
        }
        fs::set_permissions(dst, perms)?;
        return Ok(Synced::Copied);
    }

    clear_slot(dst)?;
    fs::copy(src, dst)?;
    fs::set_permissions(dst, perms)?;
    Ok(Synced::Copied)
}

fn sync_link(src: &Path, rel: &Path, dst: &Path, any_target: bool) -> io::Result<Synced> {
    let target = fs::read_link(src)?;
    if !any_target && !link_stays_inside(rel, &target) {
        return Ok(Synced::UnsafeLink);
    }

    if let Ok(existing) = fs::read_link(dst)
        && existing == target
    {
        return Ok(Synced::Unchanged);
    }

    clear_slot(dst)?;
    create_symlink(&target, dst)?;
    Ok(Synced::Copied)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symlinks are not supported here: {}", link.display()),
    ))
}

/// Whether a link at `rel` (relative to the mirror root) pointing at `target`
/// resolves to a location inside the root.
pub fn link_stays_inside(rel: &Path, target: &Path) -> bool {
    let mut depth = rel
        .parent()
        .map(|p| {
            p.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_link_inside_root_is_safe() {
        assert!(link_stays_inside(
            Path::new("sites-enabled/default"),
            Path::new("../sites-available/default")
        ));
    }

    #[test]
    fn link_escaping_root_is_unsafe() {
        assert!(!link_stays_inside(Path::new("default"), Path::new("../passwd")));
        assert!(!link_stays_inside(
            Path::new("a/b"),
            Path::new("../../outside")
        ));
    }

    #[test]
    fn absolute_link_is_unsafe() {
        assert!(!link_stays_inside(Path::new("conf"), Path::new("/etc/shadow")));
    }

    #[test]
    fn stats_changed_reflects_writes() {
        let mut stats = MirrorStats::default();
        assert!(!stats.changed());
        stats.deleted = 1;
        assert!(stats.changed());
    }
}

//! Drift detection
//!
//! Compares the live filesystem against a reference snapshot without touching
//! the store's working tree. Both sides are materialized in a temporary
//! directory: the live side through the same exclude rules the snapshot
//! engine uses, the reference side through a subtree checkout.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use similar::{DiffTag, TextDiff};
use tempfile::TempDir;
use vault_fs::{ExcludeSet, Mirror};
use vault_git::CommitStore;
use walkdir::WalkDir;

use crate::config::BackupPath;
use crate::{Error, Result};

/// Changed-line count above which any path is critical.
const CRITICAL_LINES: usize = 20;

/// Changed-line count above which a database path is major.
const DATABASE_MAJOR_LINES: usize = 5;

const DATABASE_MARKERS: &[&str] = &["mysql", "mariadb"];

/// Ordinal classification of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Minor,
    Major,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Classify a modified path by its name and number of changed lines.
pub fn classify(component: &str, lines_changed: usize) -> Severity {
    let lower = component.to_lowercase();
    let database = DATABASE_MARKERS.iter().any(|m| lower.contains(m));

    if lines_changed > CRITICAL_LINES {
        Severity::Critical
    } else if database && lines_changed > DATABASE_MAJOR_LINES {
        Severity::Major
    } else {
        Severity::Minor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The live path has no counterpart in the reference
    New,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub relative_path: PathBuf,
    pub kind: FileChangeKind,
    pub lines_changed: usize,
}

/// Drift found under one backup path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub lines_changed: usize,
    pub severity: Severity,
    pub files: Vec<FileChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub reference_commit: String,
    pub entries: Vec<ChangeEntry>,
    pub overall_severity: Severity,
}

impl DriftReport {
    fn new(reference_commit: String, entries: Vec<ChangeEntry>) -> Self {
        let overall_severity = entries
            .iter()
            .map(|e| e.severity)
            .max()
            .unwrap_or(Severity::None);
        Self {
            reference_commit,
            entries,
            overall_severity,
        }
    }

    pub fn has_drift(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Event data for the drift notification.
    pub fn event_data(&self) -> Value {
        let changes: Vec<Value> = self
            .entries
            .iter()
            .map(|e| {
                json!({
                    "path": e.path,
                    "type": e.kind,
                    "lines_changed": e.lines_changed,
                    "severity": e.severity,
                })
            })
            .collect();
        json!({
            "reference_commit": self.reference_commit,
            "overall_severity": self.overall_severity,
            "changes": changes,
        })
    }
}

/// Compares live directories with a reference snapshot.
#[derive(Debug, Clone)]
pub struct DriftDetector {
    store: CommitStore,
    host: String,
}

impl DriftDetector {
    pub fn new(store: CommitStore, host: impl Into<String>) -> Self {
        Self {
            store,
            host: host.into(),
        }
    }

    /// Compare `paths` against `reference` (a commit id or `latest`).
    pub fn run(&self, reference: &str, paths: &[BackupPath]) -> Result<DriftReport> {
        let commit = self.store.rev_parse(reference).map_err(|e| match e {
            vault_git::Error::RefNotFound { .. } => Error::ReferenceNotFound {
                reference: reference.to_string(),
            },
            other => other.into(),
        })?;
        tracing::debug!(reference, commit = %commit, "Resolved drift reference");

        let scratch = TempDir::new()?;
        let mut entries = Vec::new();

        for backup in paths {
            if let Some(entry) = self.check_path(&commit, backup, scratch.path())? {
                tracing::info!(
                    path = %entry.path.display(),
                    lines = entry.lines_changed,
                    severity = %entry.severity,
                    "Drift detected"
                );
                entries.push(entry);
            }
        }

        let report = DriftReport::new(commit, entries);
        tracing::info!(
            commit = %report.reference_commit,
            changes = report.entries.len(),
            severity = %report.overall_severity,
            "Drift check complete"
        );
        Ok(report)
    }

    fn check_path(&self, commit: &str, backup: &BackupPath, scratch: &Path) -> Result<Option<ChangeEntry>> {
        let component = backup.component();
        let excludes = ExcludeSet::new(&backup.exclude)?;
        let subtree = format!("{}/{}", self.host, component);

        let live_exists = backup.path.is_dir();
        let in_reference = self.store.tree_contains(commit, &subtree)?;

        let live_dir = scratch.join("live").join(&component);
        let ref_dir = scratch.join("reference").join(&component);

        if live_exists {
            Mirror::new(excludes.clone()).sync(&backup.path, &live_dir)?;
        } else {
            fs::create_dir_all(&live_dir)?;
        }
        if in_reference {
            self.store.checkout_subtree(commit, &subtree, &ref_dir)?;
        } else {
            fs::create_dir_all(&ref_dir)?;
        }

        let (kind, severity_override) = match (live_exists, in_reference) {
            (false, false) => return Ok(None),
            (true, false) => (ChangeKind::New, Some(Severity::Major)),
            _ => (ChangeKind::Modified, None),
        };

        let files = diff_trees(&ref_dir, &live_dir, &excludes)?;
        if files.is_empty() && kind == ChangeKind::Modified {
            return Ok(None);
        }

        let lines_changed = files.iter().map(|f| f.lines_changed).sum();
        let severity = severity_override.unwrap_or_else(|| classify(&component, lines_changed));

        Ok(Some(ChangeEntry {
            path: backup.path.clone(),
            kind,
            lines_changed,
            severity,
            files,
        }))
    }
}

/// Per-file differences between two materialized trees.
pub fn diff_trees(reference: &Path, live: &Path, excludes: &ExcludeSet) -> Result<Vec<FileChange>> {
    let old = collect_files(reference, excludes)?;
    let new = collect_files(live, excludes)?;

    let mut changes = Vec::new();

    for (rel, old_path) in &old {
        let old_content = read_entry(old_path)?;
        match new.get(rel) {
            Some(new_path) => {
                let new_content = read_entry(new_path)?;
                if old_content != new_content {
                    changes.push(FileChange {
                        relative_path: rel.clone(),
                        kind: FileChangeKind::Modified,
                        lines_changed: changed_lines(&old_content, &new_content),
                    });
                }
            }
            None => changes.push(FileChange {
                relative_path: rel.clone(),
                kind: FileChangeKind::Removed,
                lines_changed: line_count(&old_content),
            }),
        }
    }

    for (rel, new_path) in &new {
        if !old.contains_key(rel) {
            let content = read_entry(new_path)?;
            changes.push(FileChange {
                relative_path: rel.clone(),
                kind: FileChangeKind::Added,
                lines_changed: line_count(&content),
            });
        }
    }

    changes.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(changes)
}

fn collect_files(root: &Path, excludes: &ExcludeSet) -> Result<BTreeMap<PathBuf, PathBuf>> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        if excludes.is_excluded(rel) {
            continue;
        }
        files.insert(rel.to_path_buf(), entry.path().to_path_buf());
    }
    Ok(files)
}

/// File bytes, or the link target for symlinks.
fn read_entry(path: &Path) -> Result<Vec<u8>> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        return Ok(target.to_string_lossy().into_owned().into_bytes());
    }
    Ok(fs::read(path)?)
}

fn as_text(content: &[u8]) -> Option<&str> {
    if content.contains(&0) {
        return None;
    }
    std::str::from_utf8(content).ok()
}

/// Lines in a whole file; binary content counts as one.
fn line_count(content: &[u8]) -> usize {
    match as_text(content) {
        Some(text) => text.lines().count(),
        None => 1,
    }
}

/// Lines touched by an edit. A replaced block counts its larger side, so
/// rewriting three lines is a three-line change. Binary content counts as one.
fn changed_lines(old: &[u8], new: &[u8]) -> usize {
    let (Some(old), Some(new)) = (as_text(old), as_text(new)) else {
        return 1;
    };

    let diff = TextDiff::from_lines(old, new);
    let touched: usize = diff
        .ops()
        .iter()
        .map(|op| {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => 0,
                DiffTag::Delete => old_range.len(),
                DiffTag::Insert => new_range.len(),
                DiffTag::Replace => old_range.len().max(new_range.len()),
            }
        })
        .sum();
    // Whitespace-at-EOF edits still count as a change
    touched.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("nginx", 3, Severity::Minor)]
    #[case("nginx", 20, Severity::Minor)]
    #[case("nginx", 21, Severity::Critical)]
    #[case("mysql", 5, Severity::Minor)]
    #[case("mysql", 6, Severity::Major)]
    #[case("MariaDB", 8, Severity::Major)]
    #[case("mysql", 25, Severity::Critical)]
    fn classification(#[case] name: &str, #[case] lines: usize, #[case] expected: Severity) {
        assert_eq!(classify(name, lines), expected);
    }

    #[test]
    fn rewritten_lines_count_once() {
        let old = "a\nb\nc\nd\ne\n";
        let new = "a\nB\nC\nD\ne\n";
        assert_eq!(changed_lines(old.as_bytes(), new.as_bytes()), 3);
    }

    #[test]
    fn appended_lines_are_counted() {
        assert_eq!(changed_lines(b"a\n", b"a\nb\nc\n"), 2);
    }

    #[test]
    fn binary_counts_as_one_line() {
        assert_eq!(changed_lines(b"\0\x01\x02", b"\0\x01\x03"), 1);
        assert_eq!(line_count(b"\0\xff"), 1);
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::None < Severity::Minor);
        assert!(Severity::Major < Severity::Critical);
    }
}

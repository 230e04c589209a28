//! Snapshot engine
//!
//! Mirrors every configured live directory into `<store>/<host>/<name>` and
//! records the result as a single commit. Paths that are missing or fail to
//! mirror are recorded and skipped; the run only fails outright when nothing
//! at all could be mirrored.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use vault_fs::lock::LOCK_FILE_NAME;
use vault_fs::{ExcludeSet, Mirror, MirrorStats, StoreLock};
use vault_git::{CommitOutcome, CommitStore};

use crate::config::BackupPath;
use crate::{Error, Result};

/// Take the store's advisory lock, failing fast if another process holds it.
pub fn lock_store(store: &CommitStore) -> Result<StoreLock> {
    Ok(StoreLock::try_acquire(&store.root().join(LOCK_FILE_NAME))?)
}

/// Commit message for a snapshot of `host` taken now.
pub fn commit_message(host: &str) -> String {
    format!(
        "Config backup for {host} - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// How one backup path fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    Mirrored,
    Missing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathOutcome {
    pub path: PathBuf,
    pub component: String,
    pub status: PathStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub stats: MirrorStats,
}

/// Result of one snapshot run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
    pub files_backed_up: usize,
    pub changed: bool,
    pub commit: Option<String>,
    pub pushed: bool,
    pub paths: Vec<PathOutcome>,
}

impl BackupOutcome {
    /// Live paths whose mirror changed in this run.
    pub fn changed_paths(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .filter(|p| p.status == PathStatus::Mirrored && p.stats.changed())
            .map(|p| p.path.clone())
            .collect()
    }

    pub fn count(&self, status: PathStatus) -> usize {
        self.paths.iter().filter(|p| p.status == status).count()
    }
}

/// Produces host-namespaced snapshots in a [`CommitStore`].
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    store: CommitStore,
    host: String,
    auto_push: bool,
}

impl SnapshotEngine {
    pub fn new(store: CommitStore, host: impl Into<String>, auto_push: bool) -> Self {
        Self {
            store,
            host: host.into(),
            auto_push,
        }
    }

    /// Directory holding this host's snapshot inside the store.
    pub fn host_dir(&self) -> PathBuf {
        self.store.root().join(&self.host)
    }

    /// Mirror `paths`, then stage, commit and push, all under the store lock.
    pub fn run(&self, paths: &[BackupPath]) -> Result<BackupOutcome> {
        if !self.store.is_initialized() {
            return Err(vault_git::Error::NotInitialized {
                path: self.store.root().to_path_buf(),
            }
            .into());
        }
        let _lock = lock_store(&self.store)?;

        let host_dir = self.host_dir();
        fs::create_dir_all(&host_dir).map_err(|e| vault_fs::Error::io(&host_dir, e))?;

        let outcomes: Vec<PathOutcome> = paths
            .iter()
            .map(|backup| self.mirror_one(backup, &host_dir))
            .collect();

        let mirrored = outcomes
            .iter()
            .filter(|o| o.status == PathStatus::Mirrored)
            .count();
        if mirrored == 0 {
            tracing::error!(configured = paths.len(), "No backup path could be mirrored");
            return Err(Error::NoBackupTargets);
        }

        let files_backed_up = outcomes.iter().map(|o| o.stats.files).sum();

        self.store.stage_all()?;
        let outcome = self.store.commit(&commit_message(&self.host))?;
        if outcome == CommitOutcome::NoOp {
            tracing::info!(host = %self.host, "No changes since last snapshot");
        }
        let commit = outcome.id().map(str::to_string);

        // A push that failed on an earlier run is retried even when this
        // run has nothing new to commit.
        let mut pushed = false;
        if self.auto_push && self.store.has_unpushed()? {
            if commit.is_none() {
                tracing::info!(host = %self.host, "Pushing commits left over from an earlier run");
            }
            self.store.push(None)?;
            pushed = true;
        }

        Ok(BackupOutcome {
            files_backed_up,
            changed: commit.is_some(),
            commit,
            pushed,
            paths: outcomes,
        })
    }

    fn mirror_one(&self, backup: &BackupPath, host_dir: &Path) -> PathOutcome {
        let component = backup.component();
        let mut outcome = PathOutcome {
            path: backup.path.clone(),
            component: component.clone(),
            status: PathStatus::Mirrored,
            message: None,
            stats: MirrorStats::default(),
        };

        if !backup.path.exists() {
            tracing::warn!(path = %backup.path.display(), "Backup path does not exist, skipping");
            outcome.status = PathStatus::Missing;
            outcome.message = Some("path does not exist".into());
            return outcome;
        }

        let result = ExcludeSet::new(&backup.exclude)
            .and_then(|excludes| Mirror::new(excludes).sync(&backup.path, &host_dir.join(&component)));

        match result {
            Ok(stats) => {
                tracing::info!(
                    path = %backup.path.display(),
                    files = stats.files,
                    copied = stats.copied,
                    deleted = stats.deleted,
                    "Mirrored backup path"
                );
                if stats.unsafe_links > 0 || stats.special_files > 0 {
                    tracing::warn!(
                        path = %backup.path.display(),
                        unsafe_links = stats.unsafe_links,
                        special_files = stats.special_files,
                        "Skipped entries that cannot be stored"
                    );
                }
                outcome.stats = stats;
            }
            Err(e) => {
                tracing::error!(path = %backup.path.display(), error = %e, "Failed to mirror backup path");
                outcome.status = PathStatus::Failed;
                outcome.message = Some(e.to_string());
            }
        }
        outcome
    }
}

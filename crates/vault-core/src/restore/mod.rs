//! Restore orchestrator
//!
//! Replays a historical snapshot onto the live filesystem:
//!
//! ```text
//! Start → ValidateCommit → Extract → SelectScope → Confirm
//!       → BackupLive → ApplyRestore → [ReconcileServices] → Done
//! ```
//!
//! `Cancelled` is reachable from `SelectScope` and `Confirm`, `Failed` from
//! every state. Nothing on the live filesystem is written before `BackupLive`,
//! and the extraction directory is removed on every exit path.

pub mod apply;
pub mod prompt;

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use serde_json::{Value, json};
use tempfile::TempDir;
use vault_fs::ExcludeSet;
use vault_git::CommitStore;

pub use prompt::{Prompter, Unattended};

use crate::config::BackupPath;
use crate::config::settings::find_backup_path;
use crate::services::{ReconcileReport, ServiceReconciler};
use crate::snapshot::lock_store;
use crate::{Error, Result};

const ALL_CHOICE: &str = "all";
const CANCEL_CHOICE: &str = "cancel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    Start,
    ValidateCommit,
    Extract,
    SelectScope,
    Confirm,
    BackupLive,
    ApplyRestore,
    ReconcileServices,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What to restore and how.
#[derive(Debug, Clone, Default)]
pub struct RestoreRequest {
    /// Commit id, or `latest`
    pub reference: String,
    /// Component name or full live path; `None` asks interactively
    pub component: Option<String>,
    pub restart_services: bool,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredPath {
    pub path: PathBuf,
    pub safety_copy: Option<PathBuf>,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub commit: String,
    /// `Done` or `Cancelled`
    pub state: RestoreState,
    pub restored: Vec<RestoredPath>,
    pub services: Option<ReconcileReport>,
    pub transitions: Vec<RestoreState>,
}

impl RestoreOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.state == RestoreState::Cancelled
    }

    pub fn event_data(&self) -> Value {
        json!({
            "commit": self.commit,
            "restored": self.restored,
            "services": self.services,
        })
    }
}

/// Transient state of one restore.
struct RestoreSession {
    source_commit: String,
    extracted: Option<TempDir>,
    scope: Vec<BackupPath>,
    pre_restore_backups: Vec<PathBuf>,
    state: RestoreState,
    transitions: Vec<RestoreState>,
}

impl RestoreSession {
    fn new() -> Self {
        Self {
            source_commit: String::new(),
            extracted: None,
            scope: Vec::new(),
            pre_restore_backups: Vec::new(),
            state: RestoreState::Start,
            transitions: vec![RestoreState::Start],
        }
    }

    fn advance(&mut self, next: RestoreState) {
        tracing::info!(from = %self.state, to = %next, commit = %self.source_commit, "Restore transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn extracted_dir(&self) -> Result<PathBuf> {
        self.extracted
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| Error::Io(std::io::Error::other("snapshot not extracted")))
    }

    fn finish(self, services: Option<ReconcileReport>, restored: Vec<RestoredPath>) -> RestoreOutcome {
        RestoreOutcome {
            commit: self.source_commit,
            state: self.state,
            restored,
            services,
            transitions: self.transitions,
        }
    }
}

/// Runs restore sessions against one host's snapshots.
#[derive(Debug, Clone)]
pub struct RestoreOrchestrator {
    store: CommitStore,
    host: String,
    paths: Vec<BackupPath>,
    reconciler: ServiceReconciler,
}

impl RestoreOrchestrator {
    pub fn new(
        store: CommitStore,
        host: impl Into<String>,
        paths: Vec<BackupPath>,
        reconciler: ServiceReconciler,
    ) -> Self {
        Self {
            store,
            host: host.into(),
            paths,
            reconciler,
        }
    }

    pub fn run(&self, request: &RestoreRequest, prompter: &dyn Prompter) -> Result<RestoreOutcome> {
        let mut session = RestoreSession::new();
        match self.execute(&mut session, request, prompter) {
            Ok((restored, services)) => Ok(session.finish(services, restored)),
            Err(e) => {
                session.advance(RestoreState::Failed);
                tracing::error!(error = %e, "Restore failed");
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        session: &mut RestoreSession,
        request: &RestoreRequest,
        prompter: &dyn Prompter,
    ) -> Result<(Vec<RestoredPath>, Option<ReconcileReport>)> {
        session.advance(RestoreState::ValidateCommit);
        session.source_commit = self.store.rev_parse(&request.reference).map_err(|e| match e {
            vault_git::Error::RefNotFound { .. } => Error::CommitNotFound {
                reference: request.reference.clone(),
            },
            other => other.into(),
        })?;

        // Unknown names fail before anything is extracted or locked
        let requested = match request.component {
            Some(ref name) => Some(self.resolve_component(name)?),
            None => None,
        };

        let lock = lock_store(&self.store)?;

        session.advance(RestoreState::Extract);
        let extracted = TempDir::new()?;
        self.store
            .checkout_subtree(&session.source_commit, &self.host, extracted.path())
            .map_err(|e| match e {
                vault_git::Error::SubtreeNotFound { .. } => Error::HostNotInSnapshot {
                    host: self.host.clone(),
                    commit: session.source_commit.clone(),
                },
                other => other.into(),
            })?;
        session.extracted = Some(extracted);
        let extracted_dir = session.extracted_dir()?;

        session.advance(RestoreState::SelectScope);
        let available: Vec<&BackupPath> = self
            .paths
            .iter()
            .filter(|b| extracted_dir.join(b.component()).is_dir())
            .collect();

        let scope = match requested {
            Some(backup) => {
                if !available.iter().any(|b| b.path == backup.path) {
                    return Err(Error::ComponentNotInSnapshot {
                        name: backup.component(),
                        commit: session.source_commit.clone(),
                    });
                }
                vec![backup]
            }
            None => match self.choose_scope(&available, &session.source_commit, prompter)? {
                Some(scope) => scope,
                None => {
                    session.advance(RestoreState::Cancelled);
                    return Ok((Vec::new(), None));
                }
            },
        };
        session.scope = scope;

        session.advance(RestoreState::Confirm);
        if !request.assume_yes {
            let names: Vec<String> = session.scope.iter().map(BackupPath::component).collect();
            let short = &session.source_commit[..session.source_commit.len().min(7)];
            let question = format!(
                "Restore {} from commit {short}? Live files will be replaced (a safety copy is kept)",
                names.join(", ")
            );
            if !prompter.confirm(&question)? {
                session.advance(RestoreState::Cancelled);
                return Ok((Vec::new(), None));
            }
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        session.advance(RestoreState::BackupLive);
        let mut safety_copies = Vec::new();
        for backup in &session.scope {
            let copy = if backup.path.exists() {
                Some(apply::backup_live(&backup.path, &stamp)?)
            } else {
                None
            };
            safety_copies.push(copy);
        }
        session.pre_restore_backups = safety_copies.iter().flatten().cloned().collect();

        session.advance(RestoreState::ApplyRestore);
        let mut restored = Vec::new();
        for (backup, safety_copy) in session.scope.iter().zip(safety_copies) {
            let excludes = ExcludeSet::new(&backup.exclude)?;
            let snapshot = extracted_dir.join(backup.component());
            let files = apply::apply_snapshot(&backup.path, &snapshot, &excludes, &stamp)?;
            tracing::info!(path = %backup.path.display(), files, "Restored live directory");
            restored.push(RestoredPath {
                path: backup.path.clone(),
                safety_copy,
                files,
            });
        }
        drop(lock);

        let services = if request.restart_services {
            session.advance(RestoreState::ReconcileServices);
            let paths: Vec<PathBuf> = restored.iter().map(|r| r.path.clone()).collect();
            Some(self.reconciler.restart(&paths))
        } else {
            None
        };

        session.advance(RestoreState::Done);
        tracing::info!(
            commit = %session.source_commit,
            paths = restored.len(),
            safety_copies = session.pre_restore_backups.len(),
            "Restore complete"
        );
        Ok((restored, services))
    }

    fn resolve_component(&self, name: &str) -> Result<BackupPath> {
        find_backup_path(&self.paths, name)
            .cloned()
            .ok_or_else(|| Error::UnknownComponent {
                name: name.to_string(),
                available: self
                    .paths
                    .iter()
                    .map(BackupPath::component)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Interactive scope selection; `None` means cancelled.
    fn choose_scope(
        &self,
        available: &[&BackupPath],
        commit: &str,
        prompter: &dyn Prompter,
    ) -> Result<Option<Vec<BackupPath>>> {
        if available.is_empty() {
            return Err(Error::HostNotInSnapshot {
                host: self.host.clone(),
                commit: commit.to_string(),
            });
        }

        let mut items: Vec<String> = available.iter().map(|b| b.component()).collect();
        items.push(ALL_CHOICE.to_string());
        items.push(CANCEL_CHOICE.to_string());

        let choice = prompter.choose("Select what to restore", &items)?;
        match items.get(choice).map(String::as_str) {
            Some(CANCEL_CHOICE) | None => Ok(None),
            Some(ALL_CHOICE) => Ok(Some(available.iter().map(|b| (*b).clone()).collect())),
            Some(_) => Ok(Some(vec![available[choice].clone()])),
        }
    }
}

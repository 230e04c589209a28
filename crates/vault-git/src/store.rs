//! CommitStore: the version-controlled snapshot store
//!
//! Mutating operations run the git CLI through the injected
//! [`PrivilegedExecutor`]; read operations open the repository with libgit2.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;

use crate::checkout;
use crate::commits::{self, CommitStat, CommitSummary, LogFilter};
use crate::executor::{CommandOutput, PrivilegedExecutor};
use crate::remote::RemoteUrl;
use crate::{Error, Result};

/// Sentinel reference meaning "the most recent commit".
pub const LATEST_REF: &str = "latest";

const REMOTE_NAME: &str = "origin";

/// Paths inside the store that must never be committed.
const STORE_IGNORES: &[&str] = &[vault_fs::lock::LOCK_FILE_NAME];

/// Author recorded on snapshot commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

/// Result of [`CommitStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created with this id
    Created(String),
    /// Nothing was staged
    NoOp,
}

impl CommitOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Created(id) => Some(id),
            Self::NoOp => None,
        }
    }
}

/// Typed wrapper over the git repository holding configuration snapshots.
#[derive(Debug, Clone)]
pub struct CommitStore {
    root: PathBuf,
    branch: String,
    identity: CommitIdentity,
    executor: Arc<dyn PrivilegedExecutor>,
}

impl CommitStore {
    pub fn new(
        root: impl Into<PathBuf>,
        branch: impl Into<String>,
        identity: CommitIdentity,
        executor: Arc<dyn PrivilegedExecutor>,
    ) -> Self {
        Self {
            root: root.into(),
            branch: branch.into(),
            identity,
            executor,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn is_initialized(&self) -> bool {
        self.root.join(".git").is_dir()
    }

    /// Initialize the store (idempotent) and point `origin` at `remote`.
    pub fn init(&self, remote: &RemoteUrl) -> Result<()> {
        let root = self.root.to_string_lossy().into_owned();

        if !self.is_initialized() {
            self.git_in(Path::new("/"), &["init", "-q", &root])?;
            let head_ref = format!("refs/heads/{}", self.branch);
            self.git(&["symbolic-ref", "HEAD", &head_ref])?;
            tracing::info!(path = %self.root.display(), branch = %self.branch, "Initialized store");
        }

        self.git(&["config", "user.name", &self.identity.name])?;
        self.git(&["config", "user.email", &self.identity.email])?;

        let has_remote = self.open()?.find_remote(REMOTE_NAME).is_ok();
        if has_remote {
            self.git(&["remote", "set-url", REMOTE_NAME, remote.as_str()])?;
        } else {
            self.git(&["remote", "add", REMOTE_NAME, remote.as_str()])?;
        }

        self.write_store_ignores()?;
        tracing::debug!(remote = %remote, "Configured store remote");
        Ok(())
    }

    /// Stage every change in the working tree, including deletions.
    pub fn stage_all(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.git(&["add", "-A"])?;
        Ok(())
    }

    /// Whether the index differs from HEAD.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let repo = self.open()?;
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if commits::is_unborn(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let index = repo.index()?;
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
        Ok(diff.deltas().len() > 0)
    }

    /// Commit the staged changes, or report [`CommitOutcome::NoOp`].
    pub fn commit(&self, message: &str) -> Result<CommitOutcome> {
        if !self.has_staged_changes()? {
            tracing::debug!("Nothing staged, skipping commit");
            return Ok(CommitOutcome::NoOp);
        }

        let name = format!("user.name={}", self.identity.name);
        let email = format!("user.email={}", self.identity.email);
        self.git(&["-c", &name, "-c", &email, "commit", "-q", "-m", message])?;

        let id = self
            .head()?
            .ok_or_else(|| Error::RefNotFound {
                reference: "HEAD".to_string(),
            })?;
        tracing::info!(commit = %id, "Created commit");
        Ok(CommitOutcome::Created(id))
    }

    /// Push HEAD to `branch` (or the store's branch) on `origin`.
    pub fn push(&self, branch: Option<&str>) -> Result<()> {
        self.ensure_initialized()?;
        let branch = branch.unwrap_or(&self.branch);
        let refspec = format!("HEAD:refs/heads/{branch}");

        let out = self.run_git(&["push", "-q", REMOTE_NAME, &refspec])?;
        if !out.success {
            return Err(Error::PushFailed {
                message: out.stderr.trim().to_string(),
            });
        }
        // Record what the remote now holds so later runs can tell whether
        // anything is still waiting to be pushed.
        let tracking = tracking_ref(branch);
        self.git(&["update-ref", &tracking, "HEAD"])?;
        tracing::info!(branch, "Pushed to remote");
        Ok(())
    }

    /// Whether HEAD holds commits that were never pushed to the store's branch.
    ///
    /// An empty store has nothing to push.
    pub fn has_unpushed(&self) -> Result<bool> {
        let Some(head) = self.head()? else {
            return Ok(false);
        };
        let repo = self.open()?;
        match repo.refname_to_id(&tracking_ref(&self.branch)) {
            Ok(pushed) => Ok(pushed.to_string() != head),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    pub fn log(&self, filter: &LogFilter) -> Result<Vec<CommitSummary>> {
        let repo = self.open()?;
        commits::list_commits(&repo, filter)
    }

    pub fn show(&self, reference: &str) -> Result<CommitStat> {
        let repo = self.open()?;
        let id = self.rev_parse(reference)?;
        let commit = repo.find_commit(git2::Oid::from_str(&id)?)?;
        commits::commit_stat(&repo, &commit)
    }

    /// Resolve `reference` to a full commit id.
    pub fn rev_parse(&self, reference: &str) -> Result<String> {
        let repo = self.open()?;
        let spec = match reference.trim() {
            "" | LATEST_REF | "HEAD" => "HEAD",
            other => other,
        };

        let not_found = || Error::RefNotFound {
            reference: reference.to_string(),
        };
        let object = repo.revparse_single(spec).map_err(|_| not_found())?;
        let commit = object.peel_to_commit().map_err(|_| not_found())?;
        Ok(commit.id().to_string())
    }

    /// Id of the most recent commit, `None` for an empty store.
    pub fn head(&self) -> Result<Option<String>> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?.id().to_string())),
            Err(e) if commits::is_unborn(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Summary of the most recent commit, if any.
    pub fn latest_commit(&self) -> Result<Option<CommitSummary>> {
        Ok(self.log(&LogFilter::limit(1))?.into_iter().next())
    }

    /// Write `subtree` of `commit_id` into `dest`; the working tree is untouched.
    pub fn checkout_subtree(&self, commit_id: &str, subtree: &str, dest: &Path) -> Result<usize> {
        let repo = self.open()?;
        checkout::checkout_subtree(&repo, commit_id, subtree, dest)
    }

    /// Whether `commit_id` contains a directory at `subtree`.
    pub fn tree_contains(&self, commit_id: &str, subtree: &str) -> Result<bool> {
        let repo = self.open()?;
        Ok(checkout::find_subtree(&repo, commit_id, subtree)?.is_some())
    }

    fn open(&self) -> Result<Repository> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized {
                path: self.root.clone(),
            });
        }
        Ok(Repository::open(&self.root)?)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized {
                path: self.root.clone(),
            })
        }
    }

    fn write_store_ignores(&self) -> Result<()> {
        let info = self.root.join(".git").join("info");
        fs::create_dir_all(&info).map_err(|e| vault_fs::Error::io(&info, e))?;
        let exclude = info.join("exclude");

        let existing = fs::read_to_string(&exclude).unwrap_or_default();
        let missing: Vec<&str> = STORE_IGNORES
            .iter()
            .copied()
            .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for entry in missing {
            content.push_str(entry);
            content.push('\n');
        }
        vault_fs::io::write_text(&exclude, &content)?;
        Ok(())
    }

    fn run_git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.executor.run("git", args, &self.root)
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.git_in(&self.root, args)
    }

    fn git_in(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput> {
        let out = self.executor.run("git", args, cwd)?;
        if !out.success {
            return Err(Error::CommandFailed {
                command: format!("git {}", args.join(" ")),
                code: out.code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }
}

fn tracking_ref(branch: &str) -> String {
    format!("refs/remotes/{REMOTE_NAME}/{branch}")
}

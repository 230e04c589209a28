//! Commit history extraction and per-commit statistics.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, Repository};

use crate::Result;

/// Summary of a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Full commit hash
    pub id: String,

    /// Short commit hash (7 characters)
    pub short_id: String,

    /// First line of the commit message
    pub message: String,

    /// Commit author name
    pub author: String,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
}

/// Which commits `log` returns.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Maximum number of commits
    pub limit: Option<usize>,
    /// Case-insensitive substring the message must contain
    pub grep: Option<String>,
    /// Only commits at or after this instant
    pub since: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn accepts(&self, summary: &CommitSummary, full_message: &str) -> bool {
        if let Some(since) = self.since
            && summary.timestamp < since
        {
            return false;
        }
        if let Some(ref needle) = self.grep
            && !full_message.to_lowercase().contains(&needle.to_lowercase())
        {
            return false;
        }
        true
    }
}

/// Diff statistics for one commit against its first parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStat {
    pub summary: CommitSummary,
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
    /// Paths touched by the commit
    pub files: Vec<String>,
}

pub(crate) fn summarize(commit: &Commit<'_>) -> CommitSummary {
    let timestamp = Utc
        .timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_default();

    let message = commit
        .message()
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .to_string();

    let author = commit.author().name().unwrap_or("Unknown").to_string();
    let id = commit.id().to_string();

    CommitSummary {
        short_id: id.chars().take(7).collect(),
        id,
        message,
        author,
        timestamp,
    }
}

/// Walk history from HEAD, most recent first, applying `filter`.
///
/// A repository without commits yields an empty list.
pub fn list_commits(repo: &Repository, filter: &LogFilter) -> Result<Vec<CommitSummary>> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if is_unborn(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let tip = head.peel_to_commit()?;

    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip.id())?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let limit = filter.limit.unwrap_or(usize::MAX);
    let mut commits = Vec::new();

    for oid in revwalk {
        if commits.len() >= limit {
            break;
        }
        let commit = repo.find_commit(oid?)?;
        let summary = summarize(&commit);
        if filter.accepts(&summary, commit.message().unwrap_or("")) {
            commits.push(summary);
        }
    }

    Ok(commits)
}

/// Compute diff statistics for `commit` against its first parent.
pub fn commit_stat(repo: &Repository, commit: &Commit<'_>) -> Result<CommitStat> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None,
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let stats = diff.stats()?;

    let files = diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();

    Ok(CommitStat {
        summary: summarize(commit),
        files_changed: stats.files_changed(),
        insertions: stats.insertions(),
        deletions: stats.deletions(),
        files,
    })
}

pub(crate) fn is_unborn(e: &git2::Error) -> bool {
    matches!(
        e.code(),
        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
    )
}

//! Error types for vault-git

use std::path::PathBuf;

/// Result type for vault-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vault-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] vault_fs::Error),

    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Store at {path} is not initialized. Run `confvault init` first.")]
    NotInitialized { path: PathBuf },

    #[error("Reference '{reference}' not found")]
    RefNotFound { reference: String },

    #[error("Path '{path}' not found in commit {commit}")]
    SubtreeNotFound { commit: String, path: String },

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid remote URL '{url}': expected ssh-identity@host:path/to/repo.git")]
    InvalidRemote { url: String },

    #[error("Unsafe entry name '{name}' in commit tree")]
    UnsafeTreeEntry { name: String },
}

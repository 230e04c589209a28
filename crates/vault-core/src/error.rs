//! Error types for vault-core

use std::path::PathBuf;

/// Result type for vault-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vault-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or inconsistent settings; raised before any mutation
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}. Create it or pass --config.")]
    ConfigNotFound { path: PathBuf },

    /// The machine's hostname no longer matches the bound identity
    #[error(
        "Host mismatch: configuration is bound to '{bound}' but this host is '{current}'. \
         Run `confvault rebind-host` or pass --ignore-host-mismatch."
    )]
    HostMismatch { bound: String, current: String },

    /// Pre-flight validation found a blocking issue
    #[error("Validation blocked the run: {summary}")]
    ValidationBlocked { summary: String },

    /// No configured backup path could be mirrored
    #[error("No backup targets: none of the configured paths could be backed up")]
    NoBackupTargets,

    /// Drift reference could not be resolved
    #[error("Reference '{reference}' not found in the store")]
    ReferenceNotFound { reference: String },

    /// Restore source could not be resolved
    #[error("Commit '{reference}' not found in the store")]
    CommitNotFound { reference: String },

    /// Restore component is not a configured backup path
    #[error("Unknown component '{name}'. Configured components: {available}")]
    UnknownComponent { name: String, available: String },

    /// Restore component is configured but absent from the chosen snapshot
    #[error("Component '{name}' is not present in commit {commit}")]
    ComponentNotInSnapshot { name: String, commit: String },

    /// Snapshot for this host is absent from the chosen commit
    #[error("Commit {commit} holds no snapshot for host '{host}'")]
    HostNotInSnapshot { host: String, commit: String },

    /// A host command could not be run
    #[error("Failed to run '{command}': {message}")]
    Probe { command: String, message: String },

    /// Webhook delivery failed (logged, never surfaced by dispatch)
    #[error("Notification failed: {message}")]
    Notification { message: String },

    /// Interactive prompt failed
    #[error("Prompt failed: {message}")]
    Prompt { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from vault-fs
    #[error(transparent)]
    Fs(#[from] vault_fs::Error),

    /// Store error from vault-git
    #[error(transparent)]
    Git(#[from] vault_git::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error was raised because another process holds the store lock.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::Fs(vault_fs::Error::LockHeld { .. }))
    }
}

//! Commit store for confvault
//!
//! [`CommitStore`] is a narrow, typed wrapper over git. Mutating operations
//! (init, stage, commit, push) run the git CLI through a
//! [`PrivilegedExecutor`] so they can execute under a dedicated
//! non-privileged identity; read operations (log, show, rev-parse,
//! subtree checkout) use libgit2 in-process.

pub mod checkout;
pub mod commits;
pub mod error;
pub mod executor;
pub mod remote;
pub mod store;

pub use commits::{CommitStat, CommitSummary, LogFilter};
pub use error::{Error, Result};
pub use executor::{CommandOutput, CurrentIdentity, PrivilegedExecutor, SudoIdentity};
pub use remote::RemoteUrl;
pub use store::{CommitIdentity, CommitOutcome, CommitStore, LATEST_REF};

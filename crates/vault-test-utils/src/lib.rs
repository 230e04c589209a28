//! Shared test utilities for the confvault workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: git fixtures (bare remotes, ssh URL redirection, inspection)
//! - [`host`]: [`TestHost`] builder laying out live config trees, a store
//!   and a bare remote under one temporary directory

pub mod git;
pub mod host;

pub use host::TestHost;

/// Remote URL used by fixtures; redirected to a local bare repository.
pub const TEST_REMOTE_URL: &str = "git@confvault.test:ops/host-configs.git";

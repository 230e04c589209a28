//! Execution under a designated identity
//!
//! The store does not manage identities itself. It is handed a
//! [`PrivilegedExecutor`] and every mutating git invocation goes through it.

use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::{Error, Result};

/// Captured result of a command run through an executor.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Capability to run a program as a specific identity.
pub trait PrivilegedExecutor: fmt::Debug + Send + Sync {
    /// Name of the identity commands run as, `None` for the current one.
    fn identity(&self) -> Option<&str>;

    /// Build a command that runs `program` as this executor's identity.
    fn command(&self, program: &str) -> Command;

    /// Run `program` with `args` in `cwd`, capturing output.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let mut cmd = self.command(program);
        cmd.args(args).current_dir(cwd);
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        let rendered = format!("{} {}", program, args.join(" "));
        tracing::debug!(command = %rendered, identity = ?self.identity(), "Running command");

        let output = cmd.output().map_err(|source| Error::Spawn {
            command: rendered,
            source,
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs commands as the invoking user.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentIdentity;

impl PrivilegedExecutor for CurrentIdentity {
    fn identity(&self) -> Option<&str> {
        None
    }

    fn command(&self, program: &str) -> Command {
        Command::new(program)
    }
}

/// Runs commands as another user through non-interactive `sudo`.
#[derive(Debug, Clone)]
pub struct SudoIdentity {
    user: String,
}

impl SudoIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl PrivilegedExecutor for SudoIdentity {
    fn identity(&self) -> Option<&str> {
        Some(&self.user)
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new("sudo");
        cmd.args(["-n", "-u", &self.user, "-H", "--", program]);
        cmd
    }
}

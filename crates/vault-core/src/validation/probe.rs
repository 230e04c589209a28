//! Host access used by pre-flight validation

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Result};

/// Captured result of a syntax checker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOutput {
    pub success: bool,
    /// Combined stdout and stderr
    pub output: String,
}

/// Queries the validation gate makes about the host.
pub trait HostProbe: fmt::Debug + Send + Sync {
    /// Percentage in use of the filesystem holding `path`.
    fn disk_usage_percent(&self, path: &Path) -> Result<u8>;

    /// Whether the account `user` exists.
    fn user_exists(&self, user: &str) -> bool;

    /// Locate an executable on `PATH`.
    fn find_tool(&self, name: &str) -> Option<PathBuf>;

    /// Run a syntax checker and capture its verdict.
    fn run_checker(&self, program: &Path, args: &[&str]) -> Result<CheckerOutput>;
}

/// [`HostProbe`] backed by the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn disk_usage_percent(&self, path: &Path) -> Result<u8> {
        // The store may not exist yet; measure its nearest existing ancestor
        let target = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or(Path::new("/"));

        let space_error = |e: std::io::Error| Error::Probe {
            command: format!("statvfs {}", target.display()),
            message: e.to_string(),
        };
        let total = fs2::total_space(target).map_err(space_error)?;
        let available = fs2::available_space(target).map_err(space_error)?;
        Ok(usage_percent(total, available))
    }

    fn user_exists(&self, user: &str) -> bool {
        Command::new("id")
            .args(["-u", user])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn find_tool(&self, name: &str) -> Option<PathBuf> {
        // Checkers such as nginx and sshd live in sbin, often missing from PATH
        which::which(name)
            .or_else(|_| which::which_in(name, Some("/usr/sbin:/sbin"), "/"))
            .ok()
    }

    fn run_checker(&self, program: &Path, args: &[&str]) -> Result<CheckerOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::Probe {
                command: program.display().to_string(),
                message: e.to_string(),
            })?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CheckerOutput {
            success: output.status.success(),
            output: text.trim().to_string(),
        })
    }
}

/// Share of the filesystem unavailable to unprivileged writers, rounded up.
fn usage_percent(total: u64, available: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let used = u128::from(total.saturating_sub(available)) * 100;
    let percent = used.div_ceil(u128::from(total));
    u8::try_from(percent).unwrap_or(100)
}

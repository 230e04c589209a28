//! Service control backends

use std::fmt;
use std::process::Command;
use std::time::Duration;

use crate::{Error, Result};

/// How a service's health is verified after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthProbe {
    /// Database liveness ping
    DatabasePing,
    /// HTTP request against the local web server
    Http,
    /// Unit reports an active process
    Process,
}

/// Control over system services.
pub trait ServiceManager: fmt::Debug + Send + Sync {
    fn is_installed(&self, unit: &str) -> bool;

    fn restart(&self, unit: &str) -> Result<()>;

    fn reload(&self, unit: &str) -> Result<()>;

    /// Run `probe` against `unit`; `true` when healthy.
    fn probe(&self, unit: &str, probe: HealthProbe) -> bool;
}

/// [`ServiceManager`] driving systemd through `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdManager {
    http_url: String,
    http_timeout: Duration,
}

impl Default for SystemdManager {
    fn default() -> Self {
        Self {
            http_url: "http://127.0.0.1/".to_string(),
            http_timeout: Duration::from_secs(5),
        }
    }
}

impl SystemdManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn systemctl(&self, args: &[&str]) -> Result<std::process::Output> {
        tracing::debug!(args = ?args, "Running systemctl");
        Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|e| Error::Probe {
                command: format!("systemctl {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    fn control(&self, verb: &str, unit: &str) -> Result<()> {
        let output = self.systemctl(&[verb, unit])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Probe {
                command: format!("systemctl {verb} {unit}"),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn is_active(&self, unit: &str) -> bool {
        self.systemctl(&["is-active", "--quiet", unit])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn http_ok(&self) -> bool {
        let client = match reqwest::blocking::Client::builder()
            .timeout(self.http_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build HTTP probe client");
                return false;
            }
        };
        match client.get(&self.http_url).send() {
            Ok(resp) => !resp.status().is_server_error(),
            Err(e) => {
                tracing::debug!(url = %self.http_url, error = %e, "HTTP probe failed");
                false
            }
        }
    }
}

impl ServiceManager for SystemdManager {
    fn is_installed(&self, unit: &str) -> bool {
        let name = format!("{unit}.service");
        self.systemctl(&["list-unit-files", "--no-legend", &name])
            .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).contains(&name))
            .unwrap_or(false)
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.control("restart", unit)
    }

    fn reload(&self, unit: &str) -> Result<()> {
        self.control("reload", unit)
    }

    fn probe(&self, unit: &str, probe: HealthProbe) -> bool {
        if !self.is_active(unit) {
            return false;
        }
        match probe {
            HealthProbe::Process => true,
            HealthProbe::DatabasePing => Command::new("mysqladmin")
                .arg("ping")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false),
            HealthProbe::Http => self.http_ok(),
        }
    }
}

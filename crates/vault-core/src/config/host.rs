//! Host identity binding
//!
//! The first run records which machine a configuration belongs to. Every
//! later run compares the live hostname against that record so a copied
//! configuration cannot silently write into another host's namespace.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vault_fs::ConfigStore;

use crate::{Error, Result};

/// File name of the identity record, stored next to the configuration file.
pub const HOST_FILE_NAME: &str = "host.toml";

const MACHINE_ID: &str = "/etc/machine-id";

/// Which machine a configuration is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostIdentity {
    pub bound_hostname: String,
    pub bound_timestamp: DateTime<Utc>,
    pub system_id: String,
}

/// Location of the identity record for the configuration at `config_path`.
pub fn host_identity_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name(HOST_FILE_NAME)
}

/// The machine's current hostname.
pub fn current_hostname() -> Result<String> {
    for source in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(raw) = fs::read_to_string(source) {
            let name = raw.trim();
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }
    }

    let output = Command::new("uname")
        .arg("-n")
        .output()
        .map_err(|e| Error::Probe {
            command: "uname -n".into(),
            message: e.to_string(),
        })?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        return Err(Error::Probe {
            command: "uname -n".into(),
            message: "empty hostname".into(),
        });
    }
    Ok(name)
}

fn read_system_id() -> String {
    match fs::read_to_string(MACHINE_ID) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

impl HostIdentity {
    /// Bind to `hostname` now.
    pub fn bind(hostname: &str) -> Result<Self> {
        vault_fs::validate_path_identifier(hostname, "Hostname").map_err(Error::configuration)?;
        Ok(Self {
            bound_hostname: hostname.to_string(),
            bound_timestamp: Utc::now(),
            system_id: read_system_id(),
        })
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let identity = ConfigStore::new()
            .load(path)
            .map_err(|e| Error::configuration(e.to_string()))?;
        Ok(Some(identity))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ConfigStore::new().save(path, self)?;
        Ok(())
    }

    /// Load the record at `path`, creating it for `hostname` on first run.
    pub fn load_or_bind(path: &Path, hostname: &str) -> Result<Self> {
        if let Some(identity) = Self::load(path)? {
            return Ok(identity);
        }
        let identity = Self::bind(hostname)?;
        identity.save(path)?;
        tracing::info!(hostname, path = %path.display(), "Bound configuration to host");
        Ok(identity)
    }

    /// Replace the record at `path` with a fresh binding to `hostname`.
    pub fn rebind(path: &Path, hostname: &str) -> Result<Self> {
        let previous = Self::load(path)?;
        let mut identity = Self::bind(hostname)?;
        if let Some(ref prev) = previous {
            identity.system_id = prev.system_id.clone();
        }
        identity.save(path)?;
        tracing::info!(
            from = previous.as_ref().map(|p| p.bound_hostname.as_str()).unwrap_or("<none>"),
            to = hostname,
            "Rebound configuration to host"
        );
        Ok(identity)
    }

    /// Compare the live hostname with the bound one.
    ///
    /// With `ignore_mismatch` a mismatch is logged and tolerated.
    pub fn verify(&self, current: &str, ignore_mismatch: bool) -> Result<()> {
        if self.bound_hostname == current {
            return Ok(());
        }
        if ignore_mismatch {
            tracing::warn!(
                bound = %self.bound_hostname,
                current,
                "Host mismatch ignored on request"
            );
            return Ok(());
        }
        Err(Error::HostMismatch {
            bound: self.bound_hostname.clone(),
            current: current.to_string(),
        })
    }
}

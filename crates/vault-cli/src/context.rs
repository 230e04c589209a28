//! Command context: configuration location and vault construction

use std::path::{Path, PathBuf};

use vault_core::{Settings, Vault};

use crate::error::Result;

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    config_path: PathBuf,
    ignore_host_mismatch: bool,
}

impl Context {
    /// Resolve the configuration path from `--config`, the environment or
    /// the platform default.
    pub fn new(config: Option<PathBuf>, ignore_host_mismatch: bool) -> Result<Self> {
        let config_path = match config {
            Some(path) => path,
            None => Settings::default_path()?,
        };
        tracing::debug!(config = %config_path.display(), "Using configuration");
        Ok(Self {
            config_path,
            ignore_host_mismatch,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings, verify the host binding and wire system capabilities.
    pub fn open_vault(&self) -> Result<Vault> {
        Ok(Vault::open(&self.config_path, self.ignore_host_mismatch)?)
    }
}

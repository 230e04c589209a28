//! TOML document loading and saving
//!
//! Both the settings file and the host binding record are TOML. Parse
//! errors carry the file path and the parser's line/column report.

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result, io};

/// Reads and writes typed TOML documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = io::read_text(path)?;
        self.parse(path, &content)
    }

    /// Parse already-read content; `path` is only used in errors.
    pub fn parse<T: DeserializeOwned>(&self, path: &Path, content: &str) -> Result<T> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string().trim_end().to_string(),
        })
    }

    /// Serialize `value` and write it atomically, creating parent directories.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let content = toml::to_string_pretty(value).map_err(|e| Error::ConfigSerialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        io::write_atomic(path, content.as_bytes())
    }
}

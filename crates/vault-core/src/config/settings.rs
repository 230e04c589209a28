//! Typed configuration schema
//!
//! Parsed declaratively from TOML; unknown keys are rejected and every value
//! is validated before any component sees it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vault_fs::ConfigStore;
use vault_git::RemoteUrl;

use crate::notify::EventType;
use crate::{Error, Result};

/// Environment variable overriding the default configuration location.
pub const CONFIG_ENV: &str = "CONFVAULT_CONFIG";

/// Root configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub repository: RepositorySettings,

    #[serde(default)]
    pub backup_paths: Vec<BackupPath>,

    #[serde(default)]
    pub webhook: WebhookSettings,

    #[serde(default)]
    pub services: ServiceSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositorySettings {
    /// ssh remote, `identity@host:path/to/repo.git`
    pub url: RemoteUrl,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Local working tree of the store
    pub path: PathBuf,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Non-privileged identity that runs mutating git commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_user: Option<String>,

    #[serde(default = "default_true")]
    pub auto_push: bool,
}

/// A live directory to snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupPath {
    pub path: PathBuf,

    #[serde(default)]
    pub exclude: Vec<String>,
}

impl BackupPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exclude: Vec::new(),
        }
    }

    /// Directory name of this path inside the host snapshot.
    pub fn component(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "all_events")]
    pub events: Vec<EventType>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total number of delivery attempts
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            events: all_events(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl WebhookSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSettings {
    /// Wait between a successful restart and its health probe
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

impl ServiceSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_author_name() -> String {
    "confvault".to_string()
}

fn default_author_email() -> String {
    "confvault@localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn all_events() -> Vec<EventType> {
    EventType::ALL.to_vec()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_grace_period_secs() -> u64 {
    3
}

fn default_interval_secs() -> u64 {
    300
}

impl Settings {
    /// Default configuration file location.
    ///
    /// `$CONFVAULT_CONFIG` when set, otherwise `<config_dir>/confvault/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join("confvault").join("config.toml"))
            .ok_or_else(|| Error::configuration("cannot determine the user configuration directory"))
    }

    /// Load and validate settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let settings: Settings = ConfigStore::new()
            .load(path)
            .map_err(|e| Error::configuration(e.to_string()))?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), paths = settings.backup_paths.len(), "Loaded settings");
        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = ConfigStore::new()
            .parse(Path::new("config.toml"), content)
            .map_err(|e| Error::configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let repo = &self.repository;

        let branch = repo.branch.as_str();
        if branch.is_empty()
            || branch.starts_with('-')
            || branch.contains("..")
            || branch.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::configuration(format!(
                "repository.branch '{branch}' is not a valid branch name"
            )));
        }
        if !repo.path.is_absolute() {
            return Err(Error::configuration(format!(
                "repository.path '{}' must be absolute",
                repo.path.display()
            )));
        }
        if let Some(ref user) = repo.git_user {
            vault_fs::validate_path_identifier(user, "repository.git_user")
                .map_err(Error::configuration)?;
        }

        let mut seen = HashSet::new();
        for backup in &self.backup_paths {
            vault_fs::validate_source_path(&backup.path)
                .map_err(|e| Error::configuration(e.to_string()))?;
            if backup.path.starts_with(&repo.path) || repo.path.starts_with(&backup.path) {
                return Err(Error::configuration(format!(
                    "backup path {} overlaps the store at {}",
                    backup.path.display(),
                    repo.path.display()
                )));
            }
            let component = backup.component();
            if !seen.insert(component.clone()) {
                return Err(Error::configuration(format!(
                    "backup paths share the directory name '{component}'; names must be unique"
                )));
            }
        }

        let hook = &self.webhook;
        if hook.enabled {
            let url = hook.url.as_deref().unwrap_or("");
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::configuration(
                    "webhook.url must be an http(s) URL when the webhook is enabled",
                ));
            }
        }
        if hook.retry_count == 0 {
            return Err(Error::configuration("webhook.retry_count must be at least 1"));
        }
        if self.monitor.interval_secs == 0 {
            return Err(Error::configuration("monitor.interval_secs must be positive"));
        }

        Ok(())
    }

    /// Find the backup path matching `name` by full path or directory name.
    pub fn find_backup_path(&self, name: &str) -> Option<&BackupPath> {
        find_backup_path(&self.backup_paths, name)
    }

    /// Directory names of all configured backup paths, in order.
    pub fn components(&self) -> Vec<String> {
        self.backup_paths.iter().map(BackupPath::component).collect()
    }
}

/// Match `name` against `paths` by full path first, then by directory name.
pub fn find_backup_path<'a>(paths: &'a [BackupPath], name: &str) -> Option<&'a BackupPath> {
    let trimmed = name.trim_end_matches('/');
    paths
        .iter()
        .find(|b| b.path == Path::new(trimmed))
        .or_else(|| paths.iter().find(|b| b.component() == trimmed))
}

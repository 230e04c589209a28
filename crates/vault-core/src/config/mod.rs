//! Configuration: typed settings and host identity

pub mod host;
pub mod settings;

pub use host::{HOST_FILE_NAME, HostIdentity, current_hostname, host_identity_path};
pub use settings::{
    BackupPath, CONFIG_ENV, MonitorSettings, RepositorySettings, ServiceSettings, Settings,
    WebhookSettings,
};

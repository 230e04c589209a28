//! Top-level orchestrator
//!
//! [`Vault`] owns the settings and host identity, wires the components
//! together and turns component outcomes into notifications.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use vault_git::{
    CommitIdentity, CommitStat, CommitStore, CommitSummary, CurrentIdentity, LogFilter,
    PrivilegedExecutor, SudoIdentity,
};

use crate::config::{HostIdentity, Settings, current_hostname, host_identity_path};
use crate::drift::{DriftDetector, DriftReport, Severity};
use crate::notify::{
    DispatchOutcome, EventSeverity, EventType, HttpTransport, NotificationDispatcher,
    WebhookEvent, WebhookTransport,
};
use crate::restore::{Prompter, RestoreOrchestrator, RestoreOutcome, RestoreRequest};
use crate::services::{ReconcileReport, ServiceManager, ServiceReconciler, SystemdManager};
use crate::snapshot::{BackupOutcome, SnapshotEngine};
use crate::validation::{HostProbe, SystemProbe, ValidationGate, ValidationReport};
use crate::{Error, Result};

/// Host capabilities injected into the vault.
#[derive(Debug, Clone)]
pub struct VaultDeps {
    pub executor: Arc<dyn PrivilegedExecutor>,
    pub probe: Arc<dyn HostProbe>,
    pub services: Arc<dyn ServiceManager>,
    pub transport: Arc<dyn WebhookTransport>,
}

impl VaultDeps {
    /// Capabilities backed by the running system.
    pub fn system(settings: &Settings) -> Result<Self> {
        let executor: Arc<dyn PrivilegedExecutor> = match settings.repository.git_user {
            Some(ref user) => Arc::new(SudoIdentity::new(user.clone())),
            None => Arc::new(CurrentIdentity),
        };
        Ok(Self {
            executor,
            probe: Arc::new(SystemProbe),
            services: Arc::new(SystemdManager::new()),
            transport: Arc::new(HttpTransport::new(settings.webhook.timeout())?),
        })
    }
}

/// Options for [`Vault::backup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub validate_first: bool,
    pub restart_services: bool,
}

/// Everything a backup run produced.
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub outcome: BackupOutcome,
    pub validation: Option<ValidationReport>,
    pub services: Option<ReconcileReport>,
}

#[derive(Debug, Clone)]
pub struct Vault {
    settings: Settings,
    host: HostIdentity,
    store: CommitStore,
    probe: Arc<dyn HostProbe>,
    reconciler: ServiceReconciler,
    dispatcher: NotificationDispatcher,
}

impl Vault {
    pub fn new(settings: Settings, host: HostIdentity, deps: VaultDeps) -> Self {
        let repo = &settings.repository;
        let store = CommitStore::new(
            repo.path.clone(),
            repo.branch.clone(),
            CommitIdentity {
                name: repo.author_name.clone(),
                email: repo.author_email.clone(),
            },
            deps.executor,
        );
        let reconciler = ServiceReconciler::new(deps.services, settings.services.grace_period());
        let dispatcher = NotificationDispatcher::new(
            settings.webhook.clone(),
            &host,
            repo.url.repo_display(),
            deps.transport,
        );

        Self {
            settings,
            host,
            store,
            probe: deps.probe,
            reconciler,
            dispatcher,
        }
    }

    /// Load settings from `config_path`, bind or verify the host identity and
    /// wire system capabilities.
    pub fn open(config_path: &Path, ignore_host_mismatch: bool) -> Result<Self> {
        let settings = Settings::load(config_path)?;
        let hostname = current_hostname()?;
        let host = HostIdentity::load_or_bind(&host_identity_path(config_path), &hostname)?;
        host.verify(&hostname, ignore_host_mismatch)?;
        let deps = VaultDeps::system(&settings)?;
        Ok(Self::new(settings, host, deps))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    pub fn store(&self) -> &CommitStore {
        &self.store
    }

    /// Name of this host's directory in the store.
    pub fn host_name(&self) -> &str {
        &self.host.bound_hostname
    }

    /// Initialize the store and point it at the configured remote.
    pub fn init_store(&self) -> Result<()> {
        self.store.init(&self.settings.repository.url)?;
        tracing::info!(
            path = %self.store.root().display(),
            remote = %self.settings.repository.url,
            "Store ready"
        );
        Ok(())
    }

    pub fn backup(&self, options: BackupOptions) -> Result<BackupRun> {
        let validation = if options.validate_first {
            let report = self.validate();
            if report.backup_blocked {
                return Err(Error::ValidationBlocked {
                    summary: report.summary(),
                });
            }
            Some(report)
        } else {
            None
        };

        let engine = SnapshotEngine::new(
            self.store.clone(),
            self.host_name(),
            self.settings.repository.auto_push,
        );

        let outcome = match engine.run(&self.settings.backup_paths) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify(WebhookEvent::new(
                    EventType::BackupFailed,
                    EventSeverity::Error,
                    format!("Backup failed: {e}"),
                ));
                return Err(e);
            }
        };

        let message = match outcome.commit {
            Some(ref id) => format!("Backup committed {} ({} files)", short(id), outcome.files_backed_up),
            None => format!("Backup found no changes ({} files)", outcome.files_backed_up),
        };
        self.notify(
            WebhookEvent::new(EventType::BackupSuccess, EventSeverity::Info, message).with_data(json!({
                "files_backed_up": outcome.files_backed_up,
                "changed": outcome.changed,
                "commit": outcome.commit,
                "pushed": outcome.pushed,
                "paths": outcome.paths,
            })),
        );

        let services = if options.restart_services {
            let changed = outcome.changed_paths();
            if changed.is_empty() {
                tracing::info!("No changed paths, no services to restart");
                None
            } else {
                let report = self.reconciler.restart(&changed);
                self.report_service_failures(&report);
                Some(report)
            }
        } else {
            None
        };

        Ok(BackupRun {
            outcome,
            validation,
            services,
        })
    }

    /// Compare live state with `reference` and notify when drift is found.
    pub fn drift_check(&self, reference: &str) -> Result<DriftReport> {
        let detector = DriftDetector::new(self.store.clone(), self.host_name());
        let report = detector.run(reference, &self.settings.backup_paths)?;

        if report.has_drift() {
            let severity = match report.overall_severity {
                Severity::Critical => EventSeverity::Critical,
                Severity::Major => EventSeverity::Error,
                Severity::Minor | Severity::None => EventSeverity::Warning,
            };
            self.notify(
                WebhookEvent::new(
                    EventType::DriftDetected,
                    severity,
                    format!(
                        "Configuration drift in {} path(s), severity {}",
                        report.entries.len(),
                        report.overall_severity
                    ),
                )
                .with_data(report.event_data()),
            );
        }
        Ok(report)
    }

    pub fn restore(&self, request: &RestoreRequest, prompter: &dyn Prompter) -> Result<RestoreOutcome> {
        let orchestrator = RestoreOrchestrator::new(
            self.store.clone(),
            self.host_name(),
            self.settings.backup_paths.clone(),
            self.reconciler.clone(),
        );

        let outcome = match orchestrator.run(request, prompter) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify(WebhookEvent::new(
                    EventType::RestoreFailed,
                    EventSeverity::Error,
                    format!("Restore from '{}' failed: {e}", request.reference),
                ));
                return Err(e);
            }
        };

        if outcome.is_cancelled() {
            tracing::info!("Restore cancelled, nothing changed");
            return Ok(outcome);
        }

        self.notify(
            WebhookEvent::new(
                EventType::RestoreSuccess,
                EventSeverity::Warning,
                format!(
                    "Restored {} path(s) from commit {}",
                    outcome.restored.len(),
                    short(&outcome.commit)
                ),
            )
            .with_data(outcome.event_data()),
        );
        if let Some(ref services) = outcome.services {
            self.report_service_failures(services);
        }
        Ok(outcome)
    }

    /// Run the pre-flight checks; a blocked report is notified.
    pub fn validate(&self) -> ValidationReport {
        let report = ValidationGate::new(&self.settings, self.probe.clone()).run();
        if report.backup_blocked {
            self.notify(
                WebhookEvent::new(
                    EventType::ValidationFailed,
                    EventSeverity::Error,
                    format!("Validation blocked backups: {}", report.summary()),
                )
                .with_data(report.event_data()),
            );
        }
        report
    }

    /// Restart services for the named components, or for every configured
    /// backup path when `names` is empty.
    pub fn restart_services(&self, names: &[String]) -> ReconcileReport {
        let components = if names.is_empty() {
            self.settings.components()
        } else {
            names.to_vec()
        };
        let report = self.reconciler.restart_components(&components);
        self.report_service_failures(&report);
        report
    }

    pub fn list(&self, filter: &LogFilter) -> Result<Vec<CommitSummary>> {
        Ok(self.store.log(filter)?)
    }

    pub fn show(&self, reference: &str) -> Result<CommitStat> {
        self.store.show(reference).map_err(|e| match e {
            vault_git::Error::RefNotFound { .. } => Error::CommitNotFound {
                reference: reference.to_string(),
            },
            other => other.into(),
        })
    }

    /// Send a test event, bypassing the allow-list.
    pub fn notify_test(&self) -> DispatchOutcome {
        let event = WebhookEvent::new(
            EventType::Test,
            EventSeverity::Info,
            format!("Test notification from {}", self.host_name()),
        );
        self.dispatcher.send(&event, self.head().as_deref())
    }

    fn report_service_failures(&self, report: &ReconcileReport) {
        if !report.all_successful {
            let failed: Vec<&str> = report.failed().map(|r| r.name.as_str()).collect();
            self.notify(
                WebhookEvent::new(
                    EventType::ServiceRestartFailed,
                    EventSeverity::Critical,
                    format!("Service restart failed: {}", failed.join(", ")),
                )
                .with_data(report.event_data()),
            );
        }
    }

    fn notify(&self, event: WebhookEvent) -> DispatchOutcome {
        self.dispatcher.dispatch(&event, self.head().as_deref())
    }

    fn head(&self) -> Option<String> {
        self.store.head().ok().flatten()
    }
}

fn short(id: &str) -> &str {
    &id[..id.len().min(7)]
}

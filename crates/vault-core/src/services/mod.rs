//! Service reconciler
//!
//! Maps changed configuration directories to the system services that read
//! them, restarts or reloads those services, then verifies they came back.

pub mod manager;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Value, json};

pub use manager::{HealthProbe, ServiceManager, SystemdManager};

/// How a unit is bounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Restart,
    /// Graceful reload, full restart if the reload fails
    ReloadFirst,
}

/// What to do for one configuration area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePlan {
    pub units: Vec<String>,
    pub strategy: Strategy,
    pub probe: HealthProbe,
}

/// Services affected by the configuration directory `component`.
pub fn plan_for(component: &str) -> ServicePlan {
    fn plan(units: &[&str], strategy: Strategy, probe: HealthProbe) -> ServicePlan {
        ServicePlan {
            units: units.iter().map(|u| u.to_string()).collect(),
            strategy,
            probe,
        }
    }

    let lower = component.to_lowercase();

    match lower.as_str() {
        "mysql" | "mariadb" | "my.cnf.d" => plan(
            &["mysql", "mariadb"],
            Strategy::Restart,
            HealthProbe::DatabasePing,
        ),
        "nginx" => plan(&["nginx"], Strategy::ReloadFirst, HealthProbe::Http),
        "apache2" | "httpd" => plan(&["apache2", "httpd"], Strategy::ReloadFirst, HealthProbe::Http),
        "redis" => plan(&["redis-server", "redis"], Strategy::Restart, HealthProbe::Process),
        "ssh" => plan(&["ssh", "sshd"], Strategy::Restart, HealthProbe::Process),
        "postfix" => plan(&["postfix"], Strategy::Restart, HealthProbe::Process),
        name if name.starts_with("php") => {
            plan(&["php-fpm"], Strategy::Restart, HealthProbe::Process)
        }
        _ => plan(&[component], Strategy::Restart, HealthProbe::Process),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartAction {
    Restart,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRestartRecord {
    pub name: String,
    pub action: RestartAction,
    pub status: RestartStatus,
    pub duration_ms: u64,
    pub health_check: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceRestartRecord {
    pub fn succeeded(&self) -> bool {
        self.status == RestartStatus::Success && self.health_check == HealthStatus::Passed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub records: Vec<ServiceRestartRecord>,
    /// Units not installed on this host
    pub skipped: Vec<String>,
    pub all_successful: bool,
}

impl ReconcileReport {
    pub fn failed(&self) -> impl Iterator<Item = &ServiceRestartRecord> {
        self.records.iter().filter(|r| !r.succeeded())
    }

    pub fn event_data(&self) -> Value {
        json!({
            "services": self.records,
            "skipped": self.skipped,
        })
    }
}

/// Restarts services behind changed configuration.
#[derive(Debug, Clone)]
pub struct ServiceReconciler {
    manager: Arc<dyn ServiceManager>,
    grace_period: Duration,
}

impl ServiceReconciler {
    pub fn new(manager: Arc<dyn ServiceManager>, grace_period: Duration) -> Self {
        Self {
            manager,
            grace_period,
        }
    }

    /// Restart the services behind each changed live path.
    pub fn restart(&self, paths: &[PathBuf]) -> ReconcileReport {
        let components: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.restart_components(&components)
    }

    /// Restart the services behind the named configuration areas.
    pub fn restart_components(&self, components: &[String]) -> ReconcileReport {
        let mut seen: Vec<String> = Vec::new();
        let mut report = ReconcileReport::default();

        for component in components {
            let plan = plan_for(component);
            for unit in &plan.units {
                if seen.contains(unit) {
                    continue;
                }
                seen.push(unit.clone());

                if !self.manager.is_installed(unit) {
                    tracing::warn!(unit = %unit, component = %component, "Service not installed, skipping");
                    report.skipped.push(unit.clone());
                    continue;
                }
                report.records.push(self.bounce(unit, &plan));
            }
        }

        report.all_successful = report.records.iter().all(ServiceRestartRecord::succeeded);
        tracing::info!(
            attempted = report.records.len(),
            skipped = report.skipped.len(),
            all_successful = report.all_successful,
            "Service reconciliation complete"
        );
        report
    }

    fn bounce(&self, unit: &str, plan: &ServicePlan) -> ServiceRestartRecord {
        let started = Instant::now();
        let mut action = RestartAction::Restart;

        let result = match plan.strategy {
            Strategy::Restart => self.manager.restart(unit),
            Strategy::ReloadFirst => match self.manager.reload(unit) {
                Ok(()) => {
                    action = RestartAction::Reload;
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(unit, error = %e, "Reload failed, falling back to restart");
                    self.manager.restart(unit)
                }
            },
        };

        let (status, health_check, message) = match result {
            Err(e) => {
                tracing::error!(unit, error = %e, "Service restart failed");
                (RestartStatus::Failed, HealthStatus::Skipped, Some(e.to_string()))
            }
            Ok(()) => {
                if !self.grace_period.is_zero() {
                    std::thread::sleep(self.grace_period);
                }
                if self.manager.probe(unit, plan.probe) {
                    tracing::info!(unit, action = ?action, "Service healthy");
                    (RestartStatus::Success, HealthStatus::Passed, None)
                } else {
                    tracing::error!(unit, probe = ?plan.probe, "Health probe failed");
                    (
                        RestartStatus::Success,
                        HealthStatus::Failed,
                        Some(format!("{:?} probe failed", plan.probe)),
                    )
                }
            }
        };

        ServiceRestartRecord {
            name: unit.to_string(),
            action,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            health_check,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_areas_map_to_both_units() {
        let plan = plan_for("mysql");
        assert_eq!(plan.units, vec!["mysql", "mariadb"]);
        assert_eq!(plan.probe, HealthProbe::DatabasePing);
        assert_eq!(plan_for("my.cnf.d"), plan);
    }

    #[test]
    fn web_servers_reload_first() {
        assert_eq!(plan_for("nginx").strategy, Strategy::ReloadFirst);
        assert_eq!(plan_for("httpd").units, vec!["apache2", "httpd"]);
    }

    #[test]
    fn unknown_areas_restart_same_named_unit() {
        let plan = plan_for("haproxy");
        assert_eq!(plan.units, vec!["haproxy"]);
        assert_eq!(plan.strategy, Strategy::Restart);
        assert_eq!(plan_for("php8.2").units, vec!["php-fpm"]);
    }
}

//! Pre-flight validation gate
//!
//! Blocking issues (store disk nearly full, missing execution identity,
//! unreadable backup path) abort a backup. Everything else is advisory.

pub mod probe;
pub mod rules;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use vault_fs::ExcludeSet;
use walkdir::WalkDir;

pub use probe::{CheckerOutput, HostProbe, SystemProbe};

use crate::config::{BackupPath, Settings};

/// Store filesystem usage above which backups are refused.
pub const DISK_USAGE_LIMIT: u8 = 90;

/// Files larger than this are not scanned for content rules.
const MAX_SCAN_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DiskSpace,
    MissingIdentity,
    UnreadablePath,
    MissingPath,
    MalformedDirective,
    DeprecatedOption,
    SyntaxError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub file: PathBuf,
    pub kind: IssueKind,
    pub message: String,
    pub suggestion: Option<String>,
    pub blocking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub backup_blocked: bool,
}

impl ValidationReport {
    fn push(&mut self, issue: ValidationIssue) {
        if issue.blocking {
            tracing::error!(file = %issue.file.display(), kind = ?issue.kind, "{}", issue.message);
            self.backup_blocked = true;
        } else {
            tracing::warn!(file = %issue.file.display(), kind = ?issue.kind, "{}", issue.message);
        }
        self.issues.push(issue);
    }

    pub fn blocking(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.blocking)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// One-line description of the blocking issues.
    pub fn summary(&self) -> String {
        let messages: Vec<&str> = self.blocking().map(|i| i.message.as_str()).collect();
        if messages.is_empty() {
            format!("{} advisory issue(s)", self.issues.len())
        } else {
            messages.join("; ")
        }
    }

    pub fn event_data(&self) -> Value {
        json!({
            "backup_blocked": self.backup_blocked,
            "issues": self.issues,
        })
    }
}

fn issue(
    file: &Path,
    kind: IssueKind,
    message: impl Into<String>,
    suggestion: Option<String>,
    blocking: bool,
) -> ValidationIssue {
    ValidationIssue {
        file: file.to_path_buf(),
        kind,
        message: message.into(),
        suggestion,
        blocking,
    }
}

/// Runs pre-flight checks against the host.
#[derive(Debug, Clone)]
pub struct ValidationGate {
    store_path: PathBuf,
    git_user: Option<String>,
    paths: Vec<BackupPath>,
    probe: Arc<dyn HostProbe>,
}

impl ValidationGate {
    pub fn new(settings: &Settings, probe: Arc<dyn HostProbe>) -> Self {
        Self {
            store_path: settings.repository.path.clone(),
            git_user: settings.repository.git_user.clone(),
            paths: settings.backup_paths.clone(),
            probe,
        }
    }

    pub fn run(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        self.check_disk(&mut report);
        self.check_identity(&mut report);
        for backup in &self.paths {
            self.check_path(backup, &mut report);
        }

        tracing::info!(
            issues = report.issues.len(),
            blocked = report.backup_blocked,
            "Validation complete"
        );
        report
    }

    fn check_disk(&self, report: &mut ValidationReport) {
        match self.probe.disk_usage_percent(&self.store_path) {
            Ok(usage) if usage > DISK_USAGE_LIMIT => report.push(issue(
                &self.store_path,
                IssueKind::DiskSpace,
                format!("Store filesystem is {usage}% full (limit {DISK_USAGE_LIMIT}%)"),
                Some("Free disk space or move the store to a larger filesystem".into()),
                true,
            )),
            Ok(usage) => tracing::debug!(usage, "Store disk usage within limit"),
            Err(e) => tracing::warn!(error = %e, "Could not determine store disk usage"),
        }
    }

    fn check_identity(&self, report: &mut ValidationReport) {
        let Some(ref user) = self.git_user else {
            return;
        };
        if !self.probe.user_exists(user) {
            report.push(issue(
                &self.store_path,
                IssueKind::MissingIdentity,
                format!("Execution identity '{user}' does not exist"),
                Some(format!("Create the user '{user}' or change repository.git_user")),
                true,
            ));
        }
    }

    fn check_path(&self, backup: &BackupPath, report: &mut ValidationReport) {
        let path = &backup.path;
        if !path.exists() {
            report.push(issue(
                path,
                IssueKind::MissingPath,
                format!("Backup path {} does not exist", path.display()),
                Some("Remove it from the configuration or create the directory".into()),
                false,
            ));
            return;
        }
        if let Err(e) = fs::read_dir(path) {
            report.push(issue(
                path,
                IssueKind::UnreadablePath,
                format!("Backup path {} is not readable: {e}", path.display()),
                Some("Fix permissions or run confvault with sufficient privileges".into()),
                true,
            ));
            return;
        }

        let component = backup.component();
        self.scan_content(backup, &component, report);
        self.run_checker(path, &component, report);
    }

    fn scan_content(&self, backup: &BackupPath, component: &str, report: &mut ValidationReport) {
        let excludes = ExcludeSet::new(&backup.exclude).unwrap_or_default();
        let database = rules::is_database_area(component);

        let files = WalkDir::new(&backup.path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .strip_prefix(&backup.path)
                    .map(|rel| !excludes.is_excluded(rel))
                    .unwrap_or(false)
            })
            .filter(|e| e.metadata().map(|m| m.len() <= MAX_SCAN_BYTES).unwrap_or(false));

        for entry in files {
            let file = entry.path();
            let Ok(content) = fs::read_to_string(file) else {
                continue;
            };

            if database && has_config_extension(file) {
                for line in rules::find_malformed_directive(&content) {
                    report.push(issue(
                        file,
                        IssueKind::MalformedDirective,
                        format!("Line {line}: 'max_connection' is not a valid option"),
                        Some("Did you mean 'max_connections'?".into()),
                        false,
                    ));
                }
            }

            for (rule, line) in rules::find_deprecated(component, &content) {
                report.push(issue(
                    file,
                    IssueKind::DeprecatedOption,
                    format!("Line {line}: deprecated option '{}'", rule.option),
                    Some(rule.suggestion.to_string()),
                    false,
                ));
            }
        }
    }

    fn run_checker(&self, path: &Path, component: &str, report: &mut ValidationReport) {
        let Some(checker) = rules::checker_for(component) else {
            return;
        };
        let Some(tool) = self.probe.find_tool(checker.tool) else {
            tracing::debug!(tool = checker.tool, "Syntax checker not installed, skipping");
            return;
        };

        match self.probe.run_checker(&tool, checker.args) {
            Ok(out) if out.success => {
                tracing::debug!(tool = checker.tool, "Syntax check passed");
            }
            Ok(out) => report.push(issue(
                path,
                IssueKind::SyntaxError,
                format!("{} {} reported errors: {}", checker.tool, checker.args.join(" "), out.output),
                Some(format!("Fix the configuration before restarting {component}")),
                false,
            )),
            Err(e) => tracing::warn!(tool = checker.tool, error = %e, "Syntax checker could not run"),
        }
    }
}

fn has_config_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cnf") | Some("conf")
    )
}

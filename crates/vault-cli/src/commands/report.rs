//! Terminal rendering shared by several commands

use colored::Colorize;
use vault_core::services::{HealthStatus, RestartStatus};
use vault_core::{ReconcileReport, Severity, ValidationReport};

pub fn print_validation(report: &ValidationReport) {
    if report.is_clean() {
        println!("{} Validation passed", "OK".green().bold());
        return;
    }

    for issue in &report.issues {
        let label = if issue.blocking {
            "BLOCKING".red().bold()
        } else {
            "warning".yellow().bold()
        };
        println!("  {} {} ({})", label, issue.message, issue.file.display());
        if let Some(ref suggestion) = issue.suggestion {
            println!("      {} {}", "->".dimmed(), suggestion);
        }
    }

    if report.backup_blocked {
        println!("{} Validation blocked backups", "FAILED".red().bold());
    } else {
        println!(
            "{} Validation passed with {} warning(s)",
            "OK".green().bold(),
            report.issues.len()
        );
    }
}

pub fn print_services(report: &ReconcileReport) {
    for record in &report.records {
        let status = match (record.status, record.health_check) {
            (RestartStatus::Failed, _) => "restart failed".red(),
            (_, HealthStatus::Failed) => "unhealthy".red(),
            (_, HealthStatus::Skipped) => "not checked".yellow(),
            (_, HealthStatus::Passed) => "healthy".green(),
        };
        println!(
            "  {} {:<16} {:?} in {}ms, {}",
            "*".cyan(),
            record.name,
            record.action,
            record.duration_ms,
            status
        );
        if let Some(ref message) = record.message {
            println!("      {}", message.dimmed());
        }
    }
    for unit in &report.skipped {
        println!("  {} {:<16} {}", "-".dimmed(), unit, "not installed".dimmed());
    }
    if report.records.is_empty() && report.skipped.is_empty() {
        println!("  {}", "No services affected".dimmed());
    }
}

pub fn severity_label(severity: Severity) -> colored::ColoredString {
    let text = severity.to_string();
    match severity {
        Severity::None => text.dimmed(),
        Severity::Minor => text.yellow(),
        Severity::Major => text.red(),
        Severity::Critical => text.red().bold(),
    }
}

/// First seven characters of a commit id.
pub fn short(id: &str) -> &str {
    &id[..id.len().min(7)]
}

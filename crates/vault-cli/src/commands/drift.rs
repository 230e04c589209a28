//! Drift-check command

use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use vault_core::drift::{ChangeKind, FileChangeKind};
use vault_core::{CycleKind, DriftReport, Monitor};

use super::report::{severity_label, short};
use crate::context::Context;
use crate::error::Result;

/// Run the drift-check command
///
/// Exits with status 1 when drift was found. With `continuous` the check
/// repeats until interrupted.
pub fn run_drift_check(
    ctx: &Context,
    reference: &str,
    continuous: Option<Option<u64>>,
    json: bool,
) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;

    if let Some(interval) = continuous {
        let secs = interval.unwrap_or(vault.settings().monitor.interval_secs);
        println!(
            "{} Checking drift against {} every {}s (Ctrl-C to stop)",
            "monitor".cyan().bold(),
            reference,
            secs
        );
        let summary = Monitor::new(&vault, CycleKind::DriftCheck, Duration::from_secs(secs))
            .with_reference(reference)
            .run();
        println!(
            "{} cycles, {} with drift, {} failed",
            summary.cycles, summary.changed_cycles, summary.failures
        );
        return Ok(ExitCode::SUCCESS);
    }

    let report = vault.drift_check(reference)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.has_drift() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &DriftReport) {
    if !report.has_drift() {
        println!(
            "{} No drift against {}",
            "OK".green().bold(),
            short(&report.reference_commit).cyan()
        );
        return;
    }

    println!(
        "{} against {} (severity {})",
        "Drift detected".red().bold(),
        short(&report.reference_commit).cyan(),
        severity_label(report.overall_severity)
    );
    println!();

    for entry in &report.entries {
        let kind = match entry.kind {
            ChangeKind::New => "new".magenta(),
            ChangeKind::Modified => "modified".yellow(),
        };
        println!(
            "  {} {} [{}] {} line(s)",
            kind,
            entry.path.display(),
            severity_label(entry.severity),
            entry.lines_changed
        );
        for file in &entry.files {
            let marker = match file.kind {
                FileChangeKind::Added => "+".green(),
                FileChangeKind::Removed => "-".red(),
                FileChangeKind::Modified => "~".yellow(),
            };
            println!(
                "      {} {} ({})",
                marker,
                file.relative_path.display(),
                file.lines_changed
            );
        }
    }
}

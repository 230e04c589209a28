//! Backup and monitor commands

use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use vault_core::snapshot::PathStatus;
use vault_core::{BackupOptions, CycleKind, Monitor};

use super::report::{print_services, print_validation, short};
use crate::context::Context;
use crate::error::Result;

/// Run the backup command
pub fn run_backup(ctx: &Context, options: BackupOptions) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let run = vault.backup(options)?;

    if let Some(ref validation) = run.validation
        && !validation.is_clean()
    {
        print_validation(validation);
        println!();
    }

    for path in &run.outcome.paths {
        let status = match path.status {
            PathStatus::Mirrored => "ok".green(),
            PathStatus::Missing => "missing".yellow(),
            PathStatus::Failed => "failed".red(),
        };
        println!("  {:<8} {}", status, path.path.display());
        if let Some(ref message) = path.message {
            println!("           {}", message.dimmed());
        }
    }
    println!();

    match run.outcome.commit {
        Some(ref id) => {
            println!(
                "{} Committed {} ({} files)",
                "OK".green().bold(),
                short(id).cyan(),
                run.outcome.files_backed_up
            );
            if run.outcome.pushed {
                println!("   Pushed to {}", vault.settings().repository.url);
            }
        }
        None => println!(
            "{} No changes since the last snapshot ({} files)",
            "OK".green().bold(),
            run.outcome.files_backed_up
        ),
    }

    if let Some(ref services) = run.services {
        println!();
        println!("{}:", "Services".bold());
        print_services(services);
        if !services.all_successful {
            eprintln!(
                "{} Some services did not come back healthy; the backup itself succeeded",
                "warning:".yellow().bold()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Run the monitor command
pub fn run_monitor(
    ctx: &Context,
    interval: Option<u64>,
    options: BackupOptions,
    cycles: Option<u64>,
) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let secs = interval.unwrap_or(vault.settings().monitor.interval_secs);

    println!(
        "{} Backing up every {}s (Ctrl-C to stop)",
        "monitor".cyan().bold(),
        secs
    );

    let mut monitor = Monitor::new(&vault, CycleKind::Backup(options), Duration::from_secs(secs));
    if let Some(cycles) = cycles {
        monitor = monitor.with_max_cycles(cycles);
    }
    let summary = monitor.run();

    println!(
        "{} cycles, {} with changes, {} failed",
        summary.cycles, summary.changed_cycles, summary.failures
    );
    Ok(if summary.failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

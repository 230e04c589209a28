//! Restore command

use std::process::ExitCode;

use colored::Colorize;
use vault_core::RestoreRequest;
use vault_core::restore::Unattended;

use super::report::{print_services, short};
use crate::context::Context;
use crate::error::Result;
use crate::interactive::TerminalPrompter;

/// Run the restore command
pub fn run_restore(ctx: &Context, request: RestoreRequest) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;

    // Fully specified unattended runs never touch the terminal
    let outcome = if request.assume_yes && request.component.is_some() {
        vault.restore(&request, &Unattended)?
    } else {
        vault.restore(&request, &TerminalPrompter)?
    };

    if outcome.is_cancelled() {
        println!("{} Restore cancelled, nothing changed", "--".yellow().bold());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} Restored from {}",
        "OK".green().bold(),
        short(&outcome.commit).cyan()
    );
    for restored in &outcome.restored {
        println!("  {} {} ({} files)", "+".green(), restored.path.display(), restored.files);
        if let Some(ref copy) = restored.safety_copy {
            println!("      previous state saved to {}", copy.display().to_string().dimmed());
        }
    }

    if let Some(ref services) = outcome.services {
        println!();
        println!("{}:", "Services".bold());
        print_services(services);
        if !services.all_successful {
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

//! Validate and restart-services commands

use std::process::ExitCode;

use colored::Colorize;

use super::report::{print_services, print_validation};
use crate::context::Context;
use crate::error::Result;

/// Run the validate command
pub fn run_validate(ctx: &Context, json: bool) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let report = vault.validate();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_validation(&report);
    }

    Ok(if report.backup_blocked {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Run the restart-services command
pub fn run_restart_services(ctx: &Context, names: &[String]) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let report = vault.restart_services(names);

    println!("{}:", "Services".bold());
    print_services(&report);

    Ok(if report.all_successful {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

//! Init and rebind-host commands

use std::process::ExitCode;

use colored::Colorize;
use vault_core::HostIdentity;
use vault_core::config::{current_hostname, host_identity_path};

use crate::context::Context;
use crate::error::Result;

/// Run the init command
pub fn run_init(ctx: &Context) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    vault.init_store()?;

    let repo = &vault.settings().repository;
    println!("{} Store initialized", "OK".green().bold());
    println!("{}:   {}", "Path".dimmed(), repo.path.display());
    println!("{}: {}", "Remote".dimmed(), repo.url);
    println!("{}: {}", "Branch".dimmed(), repo.branch);
    println!("{}:   {}", "Host".dimmed(), vault.host_name().cyan());
    println!();
    println!(
        "{} backup path(s) configured. Run {} to take the first snapshot.",
        vault.settings().backup_paths.len(),
        "confvault backup".cyan()
    );
    Ok(ExitCode::SUCCESS)
}

/// Run the rebind-host command
pub fn run_rebind_host(ctx: &Context) -> Result<ExitCode> {
    let path = host_identity_path(ctx.config_path());
    let previous = HostIdentity::load(&path)?;
    let hostname = current_hostname()?;
    let identity = HostIdentity::rebind(&path, &hostname)?;

    match previous {
        Some(prev) if prev.bound_hostname != identity.bound_hostname => println!(
            "{} Rebound from {} to {}",
            "OK".green().bold(),
            prev.bound_hostname.yellow(),
            identity.bound_hostname.cyan()
        ),
        _ => println!(
            "{} Bound to {}",
            "OK".green().bold(),
            identity.bound_hostname.cyan()
        ),
    }
    println!(
        "{} Snapshots will now be written under {}/",
        "note:".dimmed(),
        identity.bound_hostname
    );
    Ok(ExitCode::SUCCESS)
}

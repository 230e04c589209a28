//! confvault CLI
//!
//! Versioned backups of host configuration directories.

mod cli;
mod commands;
mod context;
mod error;
mod interactive;

use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use vault_core::{BackupOptions, RestoreRequest};

use cli::{Cli, Commands};
use context::Context;
use error::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(io::stderr)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

fn run(cli: Cli) -> Result<ExitCode> {
    let Some(command) = cli.command else {
        println!(
            "{} Versioned backups of host configuration",
            "confvault".green().bold()
        );
        println!();
        println!("Run {} for available commands.", "confvault --help".cyan());
        return Ok(ExitCode::SUCCESS);
    };

    let ctx = Context::new(cli.config, cli.ignore_host_mismatch)?;
    execute_command(&ctx, command)
}

fn execute_command(ctx: &Context, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Init => commands::run_init(ctx),
        Commands::Backup {
            validate_first,
            restart_services,
        } => commands::run_backup(
            ctx,
            BackupOptions {
                validate_first,
                restart_services,
            },
        ),
        Commands::Restore {
            commit,
            path,
            restart_services,
            yes,
        } => commands::run_restore(
            ctx,
            RestoreRequest {
                reference: commit,
                component: path,
                restart_services,
                assume_yes: yes,
            },
        ),
        Commands::DriftCheck {
            reference,
            continuous,
            json,
        } => commands::run_drift_check(ctx, &reference, continuous, json),
        Commands::Monitor {
            interval,
            validate_first,
            restart_services,
            cycles,
        } => commands::run_monitor(
            ctx,
            interval,
            BackupOptions {
                validate_first,
                restart_services,
            },
            cycles,
        ),
        Commands::Validate { json } => commands::run_validate(ctx, json),
        Commands::RestartServices { names } => commands::run_restart_services(ctx, &names),
        Commands::SetupWebhook {
            url,
            events,
            no_test,
        } => commands::run_setup_webhook(ctx, &url, &events, no_test),
        Commands::List { limit, grep } => commands::run_list(ctx, limit, grep),
        Commands::Show { reference } => commands::run_show(ctx, &reference),
        Commands::RebindHost => commands::run_rebind_host(ctx),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "confvault", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

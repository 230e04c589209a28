//! List and show commands

use std::process::ExitCode;

use colored::Colorize;
use vault_git::LogFilter;

use super::report::short;
use crate::context::Context;
use crate::error::Result;

/// Run the list command
pub fn run_list(ctx: &Context, limit: usize, grep: Option<String>) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let filter = LogFilter {
        limit: Some(limit),
        grep,
        since: None,
    };
    let commits = vault.list(&filter)?;

    if commits.is_empty() {
        println!("{}", "No snapshots yet".dimmed());
        return Ok(ExitCode::SUCCESS);
    }

    for commit in &commits {
        println!(
            "{}  {}  {}",
            commit.short_id.cyan(),
            commit
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            commit.message
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Run the show command
pub fn run_show(ctx: &Context, reference: &str) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let stat = vault.show(reference)?;
    let summary = &stat.summary;

    println!("{} {}", "commit".yellow(), summary.id);
    println!("{}:  {}", "Author".dimmed(), summary.author);
    println!("{}:    {}", "Date".dimmed(), summary.timestamp.to_rfc3339());
    println!();
    println!("    {}", summary.message);
    println!();

    for file in &stat.files {
        println!("  {}", file);
    }
    println!(
        " {} file(s) changed, {} insertion(s), {} deletion(s) in {}",
        stat.files_changed,
        stat.insertions.to_string().green(),
        stat.deletions.to_string().red(),
        short(&summary.id)
    );
    Ok(ExitCode::SUCCESS)
}

//! Setup-webhook command
//!
//! Edits the `[webhook]` table in place with toml_edit so comments and
//! layout of the rest of the file survive.

use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use colored::Colorize;
use toml_edit::{Array, DocumentMut, Item, Table, value};
use vault_core::notify::EventType;
use vault_core::{DispatchOutcome, Settings};

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the setup-webhook command
pub fn run_setup_webhook(ctx: &Context, url: &str, events: &[String], no_test: bool) -> Result<ExitCode> {
    let events = parse_events(events)?;
    let path = ctx.config_path();

    let updated = enable_webhook(&vault_fs::io::read_text(path)?, url, &events)?;
    // Refuse to write a file that would no longer load
    Settings::from_toml(&updated)?;
    vault_fs::io::write_text(path, &updated)?;

    println!("{} Webhook enabled in {}", "OK".green().bold(), path.display());
    println!("{}:    {}", "URL".dimmed(), url);
    if events.is_empty() {
        println!("{}: all", "Events".dimmed());
    } else {
        let names: Vec<&str> = events.iter().map(|e| e.as_str()).collect();
        println!("{}: {}", "Events".dimmed(), names.join(", "));
    }

    if no_test {
        return Ok(ExitCode::SUCCESS);
    }
    send_test(ctx, path)
}

fn send_test(ctx: &Context, path: &Path) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    match vault.notify_test() {
        DispatchOutcome::Delivered { attempts } => {
            println!(
                "{} Test event delivered (attempt {})",
                "OK".green().bold(),
                attempts
            );
            Ok(ExitCode::SUCCESS)
        }
        DispatchOutcome::Failed { attempts } => {
            eprintln!(
                "{} Test event could not be delivered after {} attempt(s); the configuration in {} was still saved",
                "warning:".yellow().bold(),
                attempts,
                path.display()
            );
            Ok(ExitCode::FAILURE)
        }
        DispatchOutcome::Disabled | DispatchOutcome::Filtered => Ok(ExitCode::SUCCESS),
    }
}

fn parse_events(names: &[String]) -> Result<Vec<EventType>> {
    names
        .iter()
        .map(|name| {
            EventType::from_str(name).map_err(|_| {
                let valid: Vec<&str> = EventType::ALL.iter().map(|e| e.as_str()).collect();
                CliError::user(format!(
                    "Unknown event '{name}'. Valid events: {}",
                    valid.join(", ")
                ))
            })
        })
        .collect()
}

/// Return `content` with the webhook enabled for `url`. An empty `events`
/// removes the allow-list so every event is sent.
fn enable_webhook(content: &str, url: &str, events: &[EventType]) -> Result<String> {
    let mut doc: DocumentMut = content.parse()?;

    let webhook = doc
        .entry("webhook")
        .or_insert(Item::Table(Table::new()))
        .as_table_mut()
        .ok_or_else(|| CliError::user("'webhook' in the configuration is not a table"))?;

    webhook["enabled"] = value(true);
    webhook["url"] = value(url);
    if events.is_empty() {
        webhook.remove("events");
    } else {
        let mut list = Array::new();
        for event in events {
            list.push(event.as_str());
        }
        webhook["events"] = value(list);
    }

    Ok(doc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "# managed by ops\n[repository]\nurl = \"git@github.com:ops/c.git\"\npath = \"/srv/store\"\n";

    #[test]
    fn adds_webhook_table_and_keeps_comments() {
        let out = enable_webhook(BASE, "https://hooks.test/x", &[EventType::BackupFailed]).unwrap();
        assert!(out.starts_with("# managed by ops\n"));
        assert!(out.contains("[webhook]"));
        assert!(out.contains("enabled = true"));
        assert!(out.contains("url = \"https://hooks.test/x\""));
        assert!(out.contains("events = [\"backup_failed\"]"));
        Settings::from_toml(&out).unwrap();
    }

    #[test]
    fn empty_event_list_sends_everything() {
        let existing = format!("{BASE}\n[webhook]\nenabled = false\nevents = [\"test\"]\nretry_count = 5\n");
        let out = enable_webhook(&existing, "https://hooks.test/y", &[]).unwrap();
        assert!(!out.contains("events"));
        assert!(out.contains("retry_count = 5"));
        let settings = Settings::from_toml(&out).unwrap();
        assert_eq!(settings.webhook.events.len(), EventType::ALL.len());
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = parse_events(&["backup_sucess".to_string()]).unwrap_err();
        assert!(err.to_string().contains("backup_success"));
    }
}

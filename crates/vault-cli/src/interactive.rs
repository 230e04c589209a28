//! Interactive prompts for CLI commands
//!
//! Uses dialoguer for terminal-based selection and confirmation.

use dialoguer::{Confirm, Select};
use vault_core::Prompter;

/// Terminal [`Prompter`] used by `restore`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

fn prompt_error(e: dialoguer::Error) -> vault_core::Error {
    vault_core::Error::Prompt {
        message: e.to_string(),
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&self, prompt: &str, items: &[String]) -> vault_core::Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm(&self, prompt: &str) -> vault_core::Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_error)
    }
}

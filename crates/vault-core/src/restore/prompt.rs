//! Interaction capability used while selecting and confirming a restore

use crate::Result;

/// Asks the operator questions.
///
/// The CLI supplies a terminal implementation; tests supply scripted answers.
pub trait Prompter {
    /// Pick one of `items`, returning its index.
    fn choose(&self, prompt: &str, items: &[String]) -> Result<usize>;

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Prompter for unattended runs: never selects, always confirms.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Prompter for Unattended {
    fn choose(&self, prompt: &str, _items: &[String]) -> Result<usize> {
        Err(crate::Error::Prompt {
            message: format!("'{prompt}' needs an answer but the run is unattended"),
        })
    }

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

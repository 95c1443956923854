//! Interactive confirmation prompt.

use dbmig_migrate::{Forced, Prompt};

use crate::output;

/// Reads `y`/`yes` from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str, default: bool) -> bool {
        output::confirm(message, default)
    }
}

/// Stdin prompt overridden by `--yes` / `--no`.
pub fn prompt(answer: Option<bool>) -> Forced<StdinPrompt> {
    Forced::new(StdinPrompt, answer)
}

//! Confirmation gate between inference and execution.

use is_terminal::IsTerminal;
use std::io;
use tracing::warn;

use crate::error::{InstallError, Result};
use crate::output::Output;
use crate::plan::Confirmation;

/// How much the user is asked before installing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Never ask.
    Always,
    /// Ask only when something would be deleted.
    NonDestructive,
    /// Always ask.
    #[default]
    Interactive,
}

/// Source of yes/no answers.
pub trait Prompter {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Asks on the terminal. Without a terminal the answer is "no".
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            return Ok(false);
        }
        prompt_answer(cliclack::confirm(question).initial_value(false).interact())
    }
}

/// Ctrl-C or Esc at the prompt is a refusal, not a failure.
fn prompt_answer(answer: io::Result<bool>) -> Result<bool> {
    match answer {
        Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(InstallError::CanceledByUser),
        other => Ok(other?),
    }
}

/// Decide whether to proceed. A refusal is [`InstallError::CanceledByUser`].
pub fn gate(
    mode: ConfirmMode,
    confirmation: &Confirmation,
    prompter: &dyn Prompter,
) -> Result<()> {
    let unattended = match mode {
        ConfirmMode::Always => true,
        ConfirmMode::NonDestructive => !confirmation.is_destructive(),
        ConfirmMode::Interactive => false,
    };
    if unattended {
        warn!(?mode, "Continuing without confirmation");
        Output::warning("Continuing without confirmation");
        return Ok(());
    }

    if prompter.confirm("Continue?")? {
        Ok(())
    } else {
        Err(InstallError::CanceledByUser)
    }
}

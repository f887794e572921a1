//! Interactive merge conflict prompt

use crate::error::{Error, Result};
use crate::merge::{Action, Choice, ConflictPrompt, FileConflict};
use crossterm::style::Stylize;
use dialoguer::Select;
use std::io::IsTerminal;

/// Asks on the terminal how to resolve each conflict
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }

    fn select(prompt: &str, items: &[&str]) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}

impl ConflictPrompt for TerminalPrompt {
    fn choose(&mut self, conflict: &FileConflict) -> Result<Choice> {
        eprintln!(
            "\n{} {}\n  {} {}",
            "Conflict:".yellow().bold(),
            conflict.target.display(),
            "from".dim(),
            conflict.source.display()
        );

        let options = [
            "Rename (keep both)",
            "Skip (leave source file in place)",
            "Overwrite target",
            "Apply one action to all remaining conflicts",
            "Quit merge",
        ];
        let choice = match Self::select("What should happen?", &options)? {
            0 => Choice::Rename,
            1 => Choice::Skip,
            2 => Choice::Overwrite,
            3 => {
                let actions = ["Rename", "Skip", "Overwrite"];
                let action = match Self::select("Action for every remaining conflict", &actions)? {
                    0 => Action::Rename,
                    1 => Action::Skip,
                    _ => Action::Overwrite,
                };
                Choice::ApplyToAll(action)
            }
            _ => Choice::Quit,
        };
        Ok(choice)
    }
}

/// Prompting only makes sense when a person is at the terminal
pub fn can_prompt() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

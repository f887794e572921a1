//! Merge conflict resolution
//!
//! Resolution is a pure transition over the standing policy; the human (or
//! automatic) decision comes from a [`ConflictPrompt`].

use crate::error::Result;
use serde::Serialize;
use std::path::PathBuf;

/// A source file whose target path is already taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileConflict {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// What to do with one conflicting file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move under the first free `_N` name
    Rename,
    /// Leave the source file where it is
    Skip,
    /// Replace the existing target
    Overwrite,
}

/// A choice offered at a conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Rename,
    Skip,
    Overwrite,
    /// Apply the action now and to every later conflict
    ApplyToAll(Action),
    Quit,
}

/// Default applied to conflicts without asking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandingPolicy {
    #[default]
    Ask,
    Always(Action),
}

/// Outcome of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply(Action),
    /// No choice available yet (dry run under `Ask`)
    Pending,
    Quit,
}

/// Resolve one conflict
///
/// A standing `Always` policy wins over any choice. Under `Ask`, a missing
/// choice leaves the conflict pending.
pub fn transition(standing: StandingPolicy, choice: Option<Choice>) -> (Decision, StandingPolicy) {
    match (standing, choice) {
        (StandingPolicy::Always(action), _) => (Decision::Apply(action), standing),
        (StandingPolicy::Ask, None) => (Decision::Pending, standing),
        (StandingPolicy::Ask, Some(choice)) => match choice {
            Choice::Rename => (Decision::Apply(Action::Rename), standing),
            Choice::Skip => (Decision::Apply(Action::Skip), standing),
            Choice::Overwrite => (Decision::Apply(Action::Overwrite), standing),
            Choice::ApplyToAll(action) => {
                (Decision::Apply(action), StandingPolicy::Always(action))
            }
            Choice::Quit => (Decision::Quit, standing),
        },
    }
}

/// Supplies a choice for a conflict, blocking until one is made
pub trait ConflictPrompt {
    fn choose(&mut self, conflict: &FileConflict) -> Result<Choice>;
}

/// Answers every conflict with the same choice
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub Choice);

impl ConflictPrompt for FixedPolicy {
    fn choose(&mut self, _conflict: &FileConflict) -> Result<Choice> {
        Ok(self.0)
    }
}

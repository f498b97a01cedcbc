//! Action step declarations.
//!
//! An action step is where a flow stops and waits for a player. It lists
//! the actions on offer; the actions themselves are declared once in the
//! action table and looked up by name.

use std::sync::Arc;

use crate::core::{Args, PlayerId};

use super::node::{Block, PlayersFn};

/// Move name that declines an optional step.
pub const PASS: &str = "__pass__";

/// One action offered by a step.
pub struct StepAction<G> {
    pub(crate) name: String,
    pub(crate) then: Block<G>,
    pub(crate) prefill: Args,
    pub(crate) expand: bool,
}

impl<G> StepAction<G> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            then: Vec::new(),
            prefill: Args::new(),
            expand: false,
        }
    }

    /// Steps to run after this action is taken.
    #[must_use]
    pub fn then(mut self, block: Block<G>) -> Self {
        self.then = block;
        self
    }

    /// Arguments fixed by the step. They override whatever the player sends.
    #[must_use]
    pub fn prefill(mut self, args: Args) -> Self {
        self.prefill = args;
        self
    }

    /// List this action's moves directly instead of folding it into the
    /// "choose an action" move.
    #[must_use]
    pub fn expand(mut self) -> Self {
        self.expand = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prefilled(&self) -> &Args {
        &self.prefill
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expand
    }
}

/// A suspension point offering one or more actions.
pub struct ActionStep<G> {
    pub(crate) players: Option<PlayersFn<G>>,
    pub(crate) prompt: Option<String>,
    pub(crate) optional: Option<String>,
    pub(crate) choices: Vec<StepAction<G>>,
}

impl<G> Default for ActionStep<G> {
    fn default() -> Self {
        Self {
            players: None,
            prompt: None,
            optional: None,
            choices: Vec::new(),
        }
    }
}

impl<G> ActionStep<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an action with no extra options.
    #[must_use]
    pub fn action(self, name: impl Into<String>) -> Self {
        self.action_with(StepAction::new(name))
    }

    /// Offer an action with options.
    #[must_use]
    pub fn action_with(mut self, action: StepAction<G>) -> Self {
        self.choices.push(action);
        self
    }

    /// Restrict who may act.
    ///
    /// Without this the step is offered to the player of the enclosing
    /// per-player node, or else to the game's current players.
    #[must_use]
    pub fn players<F>(mut self, players: F) -> Self
    where
        F: Fn(&G, &Args) -> Vec<PlayerId> + Send + Sync + 'static,
    {
        self.players = Some(Arc::new(players));
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Allow players to pass. Passing completes the step with no action.
    #[must_use]
    pub fn optional(mut self, prompt: impl Into<String>) -> Self {
        self.optional = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn choices(&self) -> &[StepAction<G>] {
        &self.choices
    }

    #[must_use]
    pub fn choice(&self, name: &str) -> Option<&StepAction<G>> {
        self.choices.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    #[must_use]
    pub fn pass_prompt(&self) -> Option<&str> {
        self.optional.as_deref()
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional.is_some()
    }

    /// Does a move by this name complete the step?
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        (name == PASS && self.is_optional()) || self.choice(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::args;

    struct Table;

    #[test]
    fn test_builder() {
        let step: ActionStep<Table> = ActionStep::new()
            .prompt("Your turn")
            .action("take")
            .action_with(StepAction::new("trade").prefill(args([("with", "bank".into())])).expand());

        assert_eq!(step.prompt_text(), Some("Your turn"));
        assert_eq!(step.choices().len(), 2);
        assert!(step.choice("trade").is_some_and(StepAction::is_expanded));
        assert!(!step.choice("take").is_some_and(StepAction::is_expanded));
        assert!(step.choice("fly").is_none());
    }

    #[test]
    fn test_pass_requires_optional() {
        let step: ActionStep<Table> = ActionStep::new().action("take");
        assert!(step.accepts("take"));
        assert!(!step.accepts(PASS));

        let step = step.optional("Pass");
        assert!(step.accepts(PASS));
        assert_eq!(step.pass_prompt(), Some("Pass"));
    }
}

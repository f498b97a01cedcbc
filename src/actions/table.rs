//! Action table.
//!
//! Actions are declared once per name as factories. Each time an action is
//! offered it is built fresh for the acting player, so selections can close
//! over per-player state such as the cards in that player's hand.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{FlowError, PlayerId, Result};

use super::action::Action;

/// Builds an action for one player.
pub type ActionFactory<G> = Arc<dyn Fn(&G, PlayerId) -> Action<G> + Send + Sync>;

/// Name to factory map.
pub struct ActionTable<G> {
    factories: FxHashMap<String, ActionFactory<G>>,
}

impl<G> Default for ActionTable<G> {
    fn default() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }
}

impl<G> ActionTable<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action factory.
    ///
    /// Fails if the name is already taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&G, PlayerId) -> Action<G> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(FlowError::DuplicateAction(name));
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the named action for `player`.
    pub fn instantiate(&self, name: &str, game: &G, player: PlayerId) -> Option<Action<G>> {
        let factory = self.factories.get(name)?;
        let mut action = factory(game, player);
        action.name = name.to_string();
        Some(action)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Selection;
    use crate::core::Args;

    struct Hands {
        cards: Vec<Vec<&'static str>>,
    }

    fn play_card(hands: &Hands, player: PlayerId) -> Action<Hands> {
        let hand = hands.cards[player.index()].clone();
        Action::new().choose(Selection::choices("card", hand))
    }

    #[test]
    fn test_instantiate_names_action() {
        let mut table = ActionTable::new();
        table.register("play", play_card).unwrap();
        let hands = Hands {
            cards: vec![vec!["ace"], vec!["king", "queen"]],
        };

        let action = table.instantiate("play", &hands, PlayerId::new(0)).unwrap();
        assert_eq!(action.name(), "play");
        assert!(table.instantiate("fold", &hands, PlayerId::new(0)).is_none());
    }

    #[test]
    fn test_factory_sees_player() {
        let mut table = ActionTable::new();
        table.register("play", play_card).unwrap();
        let hands = Hands {
            cards: vec![vec!["ace"], vec!["king", "queen"]],
        };

        let first = table.instantiate("play", &hands, PlayerId::new(0)).unwrap();
        let moves = first.pending_moves(&hands, &Args::new()).unwrap();
        assert!(moves[0].is_complete());

        let second = table.instantiate("play", &hands, PlayerId::new(1)).unwrap();
        let moves = second.pending_moves(&hands, &Args::new()).unwrap();
        assert_eq!(moves[0].selections[0].options().len(), 2);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut table: ActionTable<Hands> = ActionTable::new();
        table.register("play", play_card).unwrap();
        let err = table.register("play", play_card).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateAction(name) if name == "play"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.names(), vec!["play"]);
    }
}

//! Host game trait.
//!
//! The flow engine never owns game state. Step callbacks, selection
//! resolvers and action steps receive the host game by reference; this
//! trait is the little the engine itself needs to know about it.

use super::player::PlayerId;

/// A game whose turn structure is driven by a flow.
pub trait Game {
    /// Number of seated players.
    fn player_count(&self) -> usize;

    /// Players an action step offers moves to when neither the step nor an
    /// enclosing per-player node names them.
    ///
    /// Defaults to every player. Turn-based games return the player whose
    /// turn it is.
    fn current_players(&self) -> Vec<PlayerId> {
        PlayerId::all(self.player_count()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Table(usize);

    impl Game for Table {
        fn player_count(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_default_current_players() {
        let table = Table(3);
        assert_eq!(
            table.current_players(),
            vec![PlayerId::new(0), PlayerId::new(1), PlayerId::new(2)]
        );
    }
}

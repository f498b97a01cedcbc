//! Seeded randomness for flows and actions.
//!
//! A game owns exactly one [`GameRng`]. The manager lends it to step
//! callbacks and action steps while play moves forward; building,
//! validating or restoring a flow never draws from it. A saved
//! [`GameRngState`] therefore resumes the same stream of numbers the game
//! would have seen without the save.

use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// The random stream of one game.
#[derive(Clone, Debug)]
pub struct GameRng {
    stream: ChaCha8Rng,
    seed: u64,
}

impl GameRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            stream: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Draw an integer from `range`, e.g. `1..7` for a six-sided die.
    ///
    /// # Panics
    ///
    /// Panics if `range` is empty.
    pub fn gen_range(&mut self, range: Range<i64>) -> i64 {
        self.stream.gen_range(range)
    }

    /// Where the stream stands. Reading it draws nothing.
    #[must_use]
    pub fn state(&self) -> GameRngState {
        GameRngState {
            seed: self.seed,
            word_pos: self.stream.get_word_pos(),
        }
    }

    /// Pick the stream up exactly where `state` left it.
    #[must_use]
    pub fn from_state(state: &GameRngState) -> Self {
        let mut stream = ChaCha8Rng::seed_from_u64(state.seed);
        stream.set_word_pos(state.word_pos);
        Self {
            stream,
            seed: state.seed,
        }
    }
}

/// Persisted position of a [`GameRng`]: its seed and how many words of the
/// ChaCha stream have been consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRngState {
    pub seed: u64,
    pub word_pos: u128,
}

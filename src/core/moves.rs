//! Move messages and move history.
//!
//! A [`Move`] is what a client submits: the acting player, the action name
//! and the committed arguments. Accepted moves are kept as [`MoveRecord`]s so
//! a game can be replayed from its seed.

use serde::{Deserialize, Serialize};

use super::argument::{Argument, Args};
use super::player::PlayerId;

/// A submitted move.
///
/// ## Example
///
/// ```
/// use turnflow::core::{Move, PlayerId};
///
/// let mv = Move::new(PlayerId::new(0), "take").with_arg("resource", "oil");
/// assert_eq!(mv.name, "take");
/// assert_eq!(mv.args.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// The player submitting the move.
    pub player: PlayerId,

    /// Name of the action being taken.
    pub name: String,

    /// Committed selection values, keyed by selection name.
    #[serde(default)]
    pub args: Args,
}

impl Move {
    /// Create a move with no arguments.
    #[must_use]
    pub fn new(player: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player,
            name: name.into(),
            args: Args::new(),
        }
    }

    /// Add an argument (builder pattern).
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Replace all arguments (builder pattern).
    #[must_use]
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }
}

/// An accepted move with its position in the game's history.
///
/// Used for:
/// - Deterministic replay from the seed
/// - Debugging and audit logs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// The move as accepted, with forced selections filled in.
    #[serde(rename = "move")]
    pub mv: Move,

    /// Sequence number across the whole game (starts at 0).
    pub sequence: u32,
}

impl MoveRecord {
    /// Create a new move record.
    #[must_use]
    pub fn new(mv: Move, sequence: u32) -> Self {
        Self { mv, sequence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_builder() {
        let mv = Move::new(PlayerId::new(1), "build")
            .with_arg("size", 3)
            .with_arg("color", "red");

        assert_eq!(mv.player, PlayerId::new(1));
        assert_eq!(mv.args.get("size"), Some(&Argument::Number(3)));
        assert_eq!(mv.args.get("color"), Some(&Argument::from("red")));
    }

    #[test]
    fn test_move_json_shape() {
        let mv = Move::new(PlayerId::new(0), "take").with_arg("target", PlayerId::new(1));
        let json = serde_json::to_value(&mv).unwrap();

        assert_eq!(json["player"], 0);
        assert_eq!(json["name"], "take");
        assert_eq!(json["args"]["target"], "$p[1]");
    }

    #[test]
    fn test_move_without_args_deserializes() {
        let mv: Move = serde_json::from_str(r#"{"player":1,"name":"pass"}"#).unwrap();
        assert!(mv.args.is_empty());
    }

    #[test]
    fn test_move_record_serialization() {
        let record = MoveRecord::new(Move::new(PlayerId::new(1), "pass"), 4);
        let json = serde_json::to_string(&record).unwrap();
        let back: MoveRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(record, back);
    }
}

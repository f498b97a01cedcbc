//! Branch records: the persisted position of a running flow.
//!
//! A [`Branch`] lists one [`BranchRecord`] per active node, ordered from the
//! flow root to the innermost live node. Together with the flow definition
//! it is everything needed to resume play.
//!
//! ## JSON
//!
//! ```json
//! [
//!   { "kind": "sequence", "position": 1 },
//!   { "kind": "loop", "name": "round", "position": { "index": 2, "value": 3 }, "sequenceIndex": 0 },
//!   { "kind": "action", "name": "turn", "position": null }
//! ]
//! ```
//!
//! | kind | position |
//! |---|---|
//! | `sequence` | step index |
//! | `loop` | `{ index, value? }`, `index` null once finished |
//! | `foreach` | `{ index, value?, collection }` |
//! | `switch-case` | `{ index?, default?, value }` |
//! | `action` | `null` while awaiting, `"skipped"`, or `{ player, name, args }` |
//! | `parallel` | `{ players, branches, completed }` |

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Argument, Args, PlayerId};

/// Root-to-leaf path of records.
pub type Branch = Vec<BranchRecord>;

/// Position of a while or for loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopPosition {
    /// Iteration counter; `None` once the loop has exited.
    pub index: Option<usize>,
    /// Current loop value for counted loops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Argument>,
}

/// Position of a for-each loop. The collection is captured at entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForEachPosition {
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Argument>,
    pub collection: Vec<Argument>,
}

/// Position of a switch: the matched case, or the default block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
    pub value: Argument,
}

/// The move an action step was resolved with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionPosition {
    pub player: PlayerId,
    pub name: String,
    #[serde(default)]
    pub args: Args,
}

/// State of an action step.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ActionStatus {
    /// Waiting for a move.
    #[default]
    Awaiting,
    /// No eligible player had anything to play.
    Skipped,
    /// A move was accepted.
    Taken(ActionPosition),
}

impl Serialize for ActionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActionStatus::Awaiting => serializer.serialize_none(),
            ActionStatus::Skipped => serializer.serialize_str("skipped"),
            ActionStatus::Taken(position) => position.serialize(serializer),
        }
    }
}

impl ActionStatus {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(ActionStatus::Awaiting),
            Value::String(s) if s == "skipped" => Ok(ActionStatus::Skipped),
            other => serde_json::from_value(other)
                .map(ActionStatus::Taken)
                .map_err(|e| format!("bad action position: {e}")),
        }
    }
}

/// Per-player sub-branches of a parallel node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelPosition {
    pub players: Vec<PlayerId>,
    pub branches: Vec<Branch>,
    pub completed: Vec<bool>,
}

impl ParallelPosition {
    /// Is every player's branch finished?
    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }
}

/// Kind-specific position of one node.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Position {
    Sequence(usize),
    Loop(LoopPosition),
    ForEach(ForEachPosition),
    Switch(SwitchPosition),
    Action(ActionStatus),
    Parallel(ParallelPosition),
}

impl Position {
    /// Wire name of the node kind this position belongs to.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Position::Sequence(_) => "sequence",
            Position::Loop(_) => "loop",
            Position::ForEach(_) => "foreach",
            Position::Switch(_) => "switch-case",
            Position::Action(_) => "action",
            Position::Parallel(_) => "parallel",
        }
    }
}

/// One node's entry in a [`Branch`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct BranchRecord {
    pub name: Option<String>,
    pub position: Position,
    /// Index into the node's live block, for nodes that run a block other
    /// than their own step list.
    pub sequence_index: Option<usize>,
}

impl BranchRecord {
    pub fn new(name: Option<String>, position: Position) -> Self {
        Self {
            name,
            position,
            sequence_index: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.position.kind()
    }
}

impl Serialize for BranchRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("BranchRecord", 4)?;
        record.serialize_field("kind", self.kind())?;
        match &self.name {
            Some(name) => record.serialize_field("name", name)?,
            None => record.skip_field("name")?,
        }
        record.serialize_field("position", &self.position)?;
        match self.sequence_index {
            Some(index) => record.serialize_field("sequenceIndex", &index)?,
            None => record.skip_field("sequenceIndex")?,
        }
        record.end()
    }
}

/// Record as it appears on the wire, before the position is interpreted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    position: Value,
    #[serde(default)]
    sequence_index: Option<usize>,
}

impl TryFrom<RawRecord> for BranchRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        fn parse<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T, String> {
            serde_json::from_value(value).map_err(|e| format!("bad {kind} position: {e}"))
        }

        let position = match raw.kind.as_str() {
            "sequence" => Position::Sequence(parse("sequence", raw.position)?),
            "loop" => Position::Loop(parse("loop", raw.position)?),
            "foreach" => Position::ForEach(parse("foreach", raw.position)?),
            "switch-case" => Position::Switch(parse("switch-case", raw.position)?),
            "action" => Position::Action(ActionStatus::from_value(raw.position)?),
            "parallel" => Position::Parallel(parse("parallel", raw.position)?),
            other => return Err(format!("unknown node kind '{other}'")),
        };

        Ok(BranchRecord {
            name: raw.name,
            position,
            sequence_index: raw.sequence_index,
        })
    }
}

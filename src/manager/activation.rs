//! Activation stack records and persisted flow state.

use serde::{Deserialize, Serialize};

use crate::core::{Args, GameRngState, MoveRecord, Result};
use crate::flow::Branch;

use super::registry::FlowRef;

/// One running flow: what it is, the arguments it was entered with, and
/// where it is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub flow: FlowRef,
    #[serde(default)]
    pub args: Args,
    pub branch: Branch,
}

/// Lifecycle of a managed game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    #[default]
    NotStarted,
    Playing,
    Finished,
}

/// Everything needed to resume a game's flow.
///
/// The host game's own state is persisted separately; together they
/// restore a game without replaying any moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub status: GameStatus,
    /// Bottom to top.
    pub stack: Vec<Activation>,
    pub rng: GameRngState,
    #[serde(default)]
    pub next_follow_up: u32,
    #[serde(default)]
    pub history: Vec<MoveRecord>,
}

impl FlowState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

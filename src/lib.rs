//! # turnflow
//!
//! A resumable flow interpreter and move-resolution engine for turn-based
//! board games.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: The engine never owns game state. Flows, actions
//!    and selections receive the host game by reference through callbacks.
//!
//! 2. **Resumable**: Where a flow stands is plain data (a [`flow::Branch`]
//!    per activation). It serializes to JSON and restores without replaying
//!    moves or consuming randomness.
//!
//! 3. **Deterministic**: One seeded RNG per game, only handed to callbacks
//!    while playing forward. Same seed and same moves give the same game.
//!
//! ## Architecture
//!
//! - **Flows**: A tree of sequences, loops, switches, action steps and
//!   per-player parallel blocks, declared once and run one step at a time.
//!
//! - **Actions**: Named moves built from ordered selections. The engine
//!   enumerates what a player may still choose, fills in forced choices,
//!   and validates committed moves.
//!
//! - **Manager**: An activation stack over the main flow, subflows and
//!   follow-up actions, driven by `play()` and `process_move()`.
//!
//! ## Modules
//!
//! - `core`: Players, arguments, moves, RNG, configuration, errors
//! - `flow`: Flow nodes, branch records and the interpreter
//! - `actions`: Actions, selections and pending-move search
//! - `manager`: Game manager, activation stack and persisted state

pub mod core;
pub mod flow;
pub mod actions;
pub mod manager;

// Re-export commonly used types
pub use crate::core::{
    args, Argument, Args, ElementRef,
    FlowConfig, FlowError, Result,
    Game, GameRng, GameRngState,
    Move, MoveRecord, PlayerId,
};

pub use crate::flow::{
    actions as action_step, each_player, every_player, every_player_of, for_each, for_loop, for_range, forever,
    if_else, sequence, step, step_with, switch_case, while_loop,
    ActionStep, Branch, BranchRecord, Case, Control, FlowNode, FlowStep, Signal, StepAction, StepContext,
    SubflowCall, PASS,
};

pub use crate::actions::{
    Action, ActionTable, Choice, FollowUp, MoveContext, MoveOutcome, PendingMove,
    ResolvedKind, ResolvedSelection, Selection, SkipIf,
};

pub use crate::manager::{
    Activation, FlowRef, FlowState, GameManager, GameManagerBuilder, GameStatus, PendingMoves, CHOOSE,
};

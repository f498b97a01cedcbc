//! Flow definitions and the interpreter that runs them.
//!
//! A flow is declared once as a tree of nodes (sequences, loops, switches,
//! action steps, per-player parallel blocks) and executed one step at a time.
//! Where execution stands is kept outside the tree as a [`Branch`] of small
//! serializable records.

pub mod signal;
pub mod branch;
pub mod node;
pub mod action_step;
pub mod interpreter;

pub use signal::{Control, Signal, SubflowCall};
pub use branch::{
    ActionPosition, ActionStatus, Branch, BranchRecord, ForEachPosition, LoopPosition, ParallelPosition, Position,
    SwitchPosition,
};
pub use node::{
    actions, each_player, every_player, every_player_of, for_each, for_loop, for_range, forever, if_else, sequence,
    step, step_with, switch_case, while_loop, Block, Case, FlowNode, FlowStep, NodeSpec, StepContext,
};
pub use action_step::{ActionStep, StepAction, PASS};
pub use interpreter::{awaiting_steps, current_step, live_block, reset, validate, Located, Scope};

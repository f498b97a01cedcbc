//! Actions and selections.
//!
//! This module decides what a player may submit: which actions are
//! playable, which choices remain within each, and whether a committed
//! move is valid.

pub mod selection;
pub mod resolved;
pub mod action;
pub mod table;
pub mod message;

pub use selection::{Dynamic, Selection, Validator};
pub use resolved::{Choice, ResolvedKind, ResolvedSelection, SkipIf, TextPattern};
pub use action::{Action, ActionFn, FollowUp, MoveContext, MoveOutcome, PendingMove};
pub use table::{ActionFactory, ActionTable};
pub use message::render;

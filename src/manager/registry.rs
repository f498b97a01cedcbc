//! Flow registry.
//!
//! Holds the main flow, the named subflows, and the one-step flows created
//! for follow-up actions while they are on the stack.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::actions::FollowUp;
use crate::core::{Args, FlowError, PlayerId, Result};
use crate::flow::{actions, sequence, ActionStep, FlowNode, StepAction};

/// Name reserved for the main flow.
pub const MAIN_FLOW: &str = "main";

/// Identifies the flow an activation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlowRef {
    Main,
    Subflow { name: String },
    /// A follow-up carries its own description so it can be rebuilt on
    /// restore.
    FollowUp { id: u32, follow_up: FollowUp },
}

impl FlowRef {
    pub fn subflow(name: impl Into<String>) -> Self {
        Self::Subflow { name: name.into() }
    }
}

impl std::fmt::Display for FlowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "{MAIN_FLOW}"),
            Self::Subflow { name } => write!(f, "{name}"),
            Self::FollowUp { id, .. } => write!(f, "__followup_{id}__"),
        }
    }
}

/// All flows a manager can activate.
pub struct FlowRegistry<G> {
    main: FlowNode<G>,
    subflows: FxHashMap<String, FlowNode<G>>,
    follow_ups: FxHashMap<u32, FlowNode<G>>,
    next_follow_up: u32,
}

impl<G> FlowRegistry<G> {
    pub fn new(main: FlowNode<G>) -> Self {
        Self {
            main,
            subflows: FxHashMap::default(),
            follow_ups: FxHashMap::default(),
            next_follow_up: 0,
        }
    }

    /// Declare a named subflow.
    pub fn add_subflow(&mut self, name: impl Into<String>, node: FlowNode<G>) -> Result<()> {
        let name = name.into();
        if name == MAIN_FLOW || self.subflows.contains_key(&name) {
            return Err(FlowError::DuplicateName(name));
        }
        self.subflows.insert(name, node);
        Ok(())
    }

    #[must_use]
    pub fn has_subflow(&self, name: &str) -> bool {
        self.subflows.contains_key(name)
    }

    pub fn get(&self, flow: &FlowRef) -> Result<&FlowNode<G>> {
        let node = match flow {
            FlowRef::Main => Some(&self.main),
            FlowRef::Subflow { name } => self.subflows.get(name),
            FlowRef::FollowUp { id, .. } => self.follow_ups.get(id),
        };
        node.ok_or_else(|| FlowError::UnknownFlow(flow.to_string()))
    }

    /// Declared flows with their names, main first.
    #[must_use]
    pub fn declared(&self) -> Vec<(&str, &FlowNode<G>)> {
        let mut subflows: Vec<_> = self.subflows.iter().map(|(name, node)| (name.as_str(), node)).collect();
        subflows.sort_unstable_by_key(|(name, _)| *name);

        let mut flows = vec![(MAIN_FLOW, &self.main)];
        flows.extend(subflows);
        flows
    }

    /// Build the flow for a follow-up and assign it a fresh id.
    pub fn add_follow_up(&mut self, follow_up: FollowUp) -> FlowRef {
        let id = self.next_follow_up;
        self.next_follow_up += 1;
        self.follow_ups.insert(id, follow_up_flow(id, &follow_up));
        FlowRef::FollowUp { id, follow_up }
    }

    /// Rebuild a follow-up flow under a known id.
    pub fn restore_follow_up(&mut self, id: u32, follow_up: &FollowUp) {
        self.follow_ups.insert(id, follow_up_flow(id, follow_up));
        self.next_follow_up = self.next_follow_up.max(id + 1);
    }

    pub fn remove_follow_up(&mut self, id: u32) {
        self.follow_ups.remove(&id);
    }

    pub fn clear_follow_ups(&mut self) {
        self.follow_ups.clear();
        self.next_follow_up = 0;
    }

    #[must_use]
    pub fn next_follow_up(&self) -> u32 {
        self.next_follow_up
    }

    pub fn set_next_follow_up(&mut self, next: u32) {
        self.next_follow_up = self.next_follow_up.max(next);
    }
}

/// A single action step offering `follow_up` to its player only, with its
/// arguments prefilled.
pub(crate) fn follow_up_flow<G>(id: u32, follow_up: &FollowUp) -> FlowNode<G> {
    let player: PlayerId = follow_up.player;
    let choice = StepAction::new(follow_up.name.clone()).prefill(follow_up.args.clone());
    let mut step = ActionStep::new()
        .players(move |_: &G, _: &Args| vec![player])
        .action_with(choice);
    if let Some(prompt) = &follow_up.prompt {
        step = step.prompt(prompt.clone());
    }
    sequence(vec![actions(step).into()]).named(format!("__followup_{id}__"))
}

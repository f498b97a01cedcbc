//! Flow interpreter.
//!
//! Drives a [`FlowNode`] tree one unit at a time against a [`Branch`].
//! Every operation dispatches on the node kind and works on the record at
//! a given depth of the branch; the record below it belongs to the live
//! child node, if any.
//!
//! ## Invariants
//!
//! - A record exists for every node on the live path. Whenever a node's
//!   position moves onto a child node, the child is reset immediately.
//! - Author callbacks are evaluated on reset or on advance only, and their
//!   results are captured into positions. Replaying a branch never calls
//!   them again.
//! - Loop interrupts travel as [`Signal`] values. Loop kinds consume them;
//!   every other kind returns them to its parent unchanged.

use smallvec::SmallVec;

use crate::core::{Argument, Args, FlowError, Game, GameRng, PlayerId, Result};

use super::action_step::ActionStep;
use super::branch::{
    ActionStatus, Branch, BranchRecord, ForEachPosition, LoopPosition, ParallelPosition, Position,
    SwitchPosition,
};
use super::node::{Block, FlowNode, FlowStep, NodeSpec, StepContext};
use super::signal::{Control, Signal, SubflowCall};

/// Argument context and active player seen by a node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub args: Args,
    pub player: Option<PlayerId>,
}

impl Scope {
    pub fn new(args: Args) -> Self {
        Self { args, player: None }
    }

    #[must_use]
    pub fn with_player(&self, player: PlayerId) -> Self {
        Self {
            args: self.args.clone(),
            player: Some(player),
        }
    }

    /// Scope seen by the children of `node` at `record`.
    #[must_use]
    pub fn enter<G>(&self, node: &FlowNode<G>, record: &BranchRecord) -> Self {
        let mut scope = self.clone();
        let name = record.name.as_deref();
        match &record.position {
            Position::Loop(LoopPosition { index: Some(index), value }) => {
                if let Some(name) = name {
                    let value = value.clone().unwrap_or_else(|| Argument::from(*index));
                    scope.args.insert(name.to_string(), value);
                }
            }
            Position::ForEach(ForEachPosition { value: Some(value), .. }) => {
                if let Some(name) = name {
                    scope.args.insert(name.to_string(), value.clone());
                }
                if matches!(node.spec, NodeSpec::ForEach { sets_player: true, .. }) {
                    if let Some(player) = value.as_player() {
                        scope.player = Some(player);
                    }
                }
            }
            Position::Switch(switch) => {
                if let Some(name) = name {
                    scope.args.insert(name.to_string(), switch.value.clone());
                }
            }
            Position::Action(ActionStatus::Taken(taken)) => {
                for (key, value) in &taken.args {
                    scope.args.insert(key.clone(), value.clone());
                }
                if let Some(name) = name {
                    scope.args.insert(name.to_string(), Argument::Text(taken.name.clone()));
                    scope.args.insert(format!("{name}.player"), Argument::Player(taken.player));
                    for (key, value) in &taken.args {
                        scope.args.insert(format!("{name}.{key}"), value.clone());
                    }
                }
                scope.player = Some(taken.player);
            }
            _ => {}
        }
        scope
    }
}

/// Mutable world a play step runs against.
pub(crate) struct Env<'a, G> {
    pub(crate) game: &'a mut G,
    pub(crate) rng: &'a mut GameRng,
    /// Subflows requested by step callbacks during this step.
    pub(crate) subflows: Vec<SubflowCall>,
}

impl<'a, G> Env<'a, G> {
    pub(crate) fn new(game: &'a mut G, rng: &'a mut GameRng) -> Self {
        Self {
            game,
            rng,
            subflows: Vec::new(),
        }
    }
}

/// An action step currently awaiting a move.
pub struct Located<'n, G> {
    pub node: &'n FlowNode<G>,
    pub step: &'n ActionStep<G>,
    /// Parallel hops from the root branch: (record depth, player branch).
    pub path: SmallVec<[(usize, usize); 2]>,
    /// Depth of the step's record in the innermost branch.
    pub depth: usize,
    pub scope: Scope,
}

impl<G: Game> Located<'_, G> {
    /// Players who may submit a move here.
    #[must_use]
    pub fn eligible_players(&self, game: &G) -> Vec<PlayerId> {
        match (&self.step.players, self.scope.player) {
            (Some(players), _) => players(game, &self.scope.args),
            (None, Some(player)) => vec![player],
            (None, None) => game.current_players(),
        }
    }
}

fn invalid<G>(node: &FlowNode<G>, reason: impl Into<String>) -> FlowError {
    FlowError::InvalidBranch {
        flow: node.label().to_string(),
        reason: reason.into(),
    }
}

/// Build the initial branch for `node`.
pub fn reset<G: Game>(node: &FlowNode<G>, game: &G, scope: &Scope) -> Branch {
    let mut branch = Vec::new();
    reset_into(node, game, scope, &mut branch);
    branch
}

fn reset_into<G: Game>(node: &FlowNode<G>, game: &G, scope: &Scope, branch: &mut Branch) {
    let position = match &node.spec {
        NodeSpec::Sequence(_) => Position::Sequence(0),
        NodeSpec::While { condition, .. } => {
            let running = condition.as_ref().map_or(true, |holds| holds(game, &scope.args));
            Position::Loop(LoopPosition {
                index: running.then_some(0),
                value: None,
            })
        }
        NodeSpec::For { initial, test, .. } => {
            let value = initial(game, &scope.args);
            if test(&value) {
                Position::Loop(LoopPosition {
                    index: Some(0),
                    value: Some(value),
                })
            } else {
                Position::Loop(LoopPosition { index: None, value: None })
            }
        }
        NodeSpec::ForEach { collection, .. } => {
            let collection = collection(game, &scope.args);
            let value = collection.first().cloned();
            Position::ForEach(ForEachPosition {
                index: value.is_some().then_some(0),
                value,
                collection,
            })
        }
        NodeSpec::Switch { value, cases, default } => {
            let value = value(game, &scope.args);
            let index = cases.iter().position(|case| case.matches(&value));
            Position::Switch(SwitchPosition {
                index,
                default: index.is_none() && default.is_some(),
                value,
            })
        }
        NodeSpec::Action(_) => Position::Action(ActionStatus::Awaiting),
        NodeSpec::Parallel { players, body } => {
            let players = match players {
                Some(players) => players(game, &scope.args),
                None => PlayerId::all(game.player_count()).collect(),
            };
            let branches = players
                .iter()
                .map(|player| reset(body, game, &scope.with_player(*player)))
                .collect();
            let completed = vec![false; players.len()];
            Position::Parallel(ParallelPosition {
                players,
                branches,
                completed,
            })
        }
    };

    let mut record = BranchRecord::new(node.name.clone(), position);
    if !matches!(node.spec, NodeSpec::Sequence(_)) {
        record.sequence_index = live_block(node, &record).map(|_| 0);
    }
    branch.push(record);
    let depth = branch.len() - 1;
    enter_step(node, game, scope, branch, depth);
}

/// The block `node` is currently running, if any.
pub fn live_block<'n, G>(node: &'n FlowNode<G>, record: &BranchRecord) -> Option<&'n Block<G>> {
    match (&node.spec, &record.position) {
        (NodeSpec::Sequence(block), Position::Sequence(_)) => Some(block),
        (NodeSpec::While { body, .. } | NodeSpec::For { body, .. }, Position::Loop(position)) => {
            position.index.map(|_| body)
        }
        (NodeSpec::ForEach { body, .. }, Position::ForEach(position)) => position.index.map(|_| body),
        (NodeSpec::Switch { cases, default, .. }, Position::Switch(position)) => match position.index {
            Some(index) => cases.get(index).map(|case| &case.block),
            None if position.default => default.as_ref(),
            None => None,
        },
        (NodeSpec::Action(step), Position::Action(ActionStatus::Taken(taken))) => step
            .choice(&taken.name)
            .map(|choice| &choice.then)
            .filter(|block| !block.is_empty()),
        _ => None,
    }
}

fn step_index(record: &BranchRecord) -> usize {
    match record.position {
        Position::Sequence(index) => index,
        _ => record.sequence_index.unwrap_or(0),
    }
}

fn set_step_index(record: &mut BranchRecord, index: usize) {
    match &mut record.position {
        Position::Sequence(current) => *current = index,
        _ => record.sequence_index = Some(index),
    }
}

/// The step `node` will run next.
pub fn current_step<'n, G>(node: &'n FlowNode<G>, record: &BranchRecord) -> Option<&'n FlowStep<G>> {
    live_block(node, record)?.get(step_index(record))
}

/// Drop records below `depth` and reset the child the node now points at.
fn enter_step<G: Game>(node: &FlowNode<G>, game: &G, scope: &Scope, branch: &mut Branch, depth: usize) {
    branch.truncate(depth + 1);
    if let Some(FlowStep::Node(child)) = current_step(node, &branch[depth]) {
        let inner = scope.enter(node, &branch[depth]);
        reset_into(child, game, &inner, branch);
    }
}

/// Drive the flow rooted at `node` by one unit.
pub(crate) fn play<G: Game>(
    node: &FlowNode<G>,
    branch: &mut Branch,
    scope: &Scope,
    env: &mut Env<'_, G>,
) -> Result<Signal> {
    play_at(node, branch, 0, scope, env)
}

fn play_at<G: Game>(
    node: &FlowNode<G>,
    branch: &mut Branch,
    depth: usize,
    scope: &Scope,
    env: &mut Env<'_, G>,
) -> Result<Signal> {
    let Some(record) = branch.get(depth) else {
        return Err(invalid(node, format!("no record at depth {depth}")));
    };

    match (&node.spec, &record.position) {
        (NodeSpec::Parallel { body, .. }, _) => return play_parallel(node, body, branch, depth, scope, env),
        (NodeSpec::Action(_), Position::Action(ActionStatus::Awaiting)) => return Ok(Signal::Awaiting),
        _ => {}
    }

    let signal = match current_step(node, record) {
        None => return finish_block(node, branch, depth, scope, &*env.game),
        Some(FlowStep::Call(callback)) => {
            let inner = scope.enter(node, record);
            let control = {
                let mut ctx = StepContext {
                    game: &mut *env.game,
                    args: &inner.args,
                    player: inner.player,
                    rng: &mut *env.rng,
                };
                callback(&mut ctx)
            };
            match control {
                Control::Proceed => Signal::Complete,
                Control::Continue => Signal::Continue,
                Control::Repeat => Signal::Repeat,
                Control::Break => Signal::Break,
                Control::Subflow(call) => {
                    env.subflows.push(call);
                    Signal::Complete
                }
            }
        }
        Some(FlowStep::Node(child)) => {
            let inner = scope.enter(node, record);
            match play_at(child, branch, depth + 1, &inner, env)? {
                Signal::Ok => return Ok(Signal::Ok),
                Signal::Awaiting => return Ok(Signal::Awaiting),
                other => other,
            }
        }
    };

    match signal {
        Signal::Complete => advance(node, branch, depth, scope, &*env.game),
        interrupt if node.is_loop() => interrupt_loop(node, branch, depth, scope, &*env.game, interrupt),
        interrupt => Ok(interrupt),
    }
}

/// The current step finished; move to the next one.
fn advance<G: Game>(node: &FlowNode<G>, branch: &mut Branch, depth: usize, scope: &Scope, game: &G) -> Result<Signal> {
    let record = &mut branch[depth];
    let next = step_index(record) + 1;
    let len = live_block(node, record).map_or(0, Vec::len);
    if next < len {
        set_step_index(record, next);
        enter_step(node, game, scope, branch, depth);
        Ok(Signal::Ok)
    } else {
        finish_block(node, branch, depth, scope, game)
    }
}

/// The live block ran out.
fn finish_block<G: Game>(
    node: &FlowNode<G>,
    branch: &mut Branch,
    depth: usize,
    scope: &Scope,
    game: &G,
) -> Result<Signal> {
    if node.is_loop() {
        return next_iteration(node, branch, depth, scope, game);
    }
    let record = &mut branch[depth];
    if let Some(len) = live_block(node, record).map(Vec::len) {
        set_step_index(record, len);
    }
    branch.truncate(depth + 1);
    Ok(Signal::Complete)
}

fn next_iteration<G: Game>(
    node: &FlowNode<G>,
    branch: &mut Branch,
    depth: usize,
    scope: &Scope,
    game: &G,
) -> Result<Signal> {
    let record = &mut branch[depth];
    let running = match (&node.spec, &mut record.position) {
        (NodeSpec::While { condition, .. }, Position::Loop(position)) => {
            let holds = condition.as_ref().map_or(true, |holds| holds(game, &scope.args));
            match position.index {
                Some(index) if holds => {
                    position.index = Some(index + 1);
                    true
                }
                _ => {
                    position.index = None;
                    false
                }
            }
        }
        (NodeSpec::For { next, test, .. }, Position::Loop(position)) => {
            let stepped = match (position.index, position.value.as_ref()) {
                (Some(index), Some(value)) => Some((index + 1, next(value))),
                _ => None,
            };
            match stepped {
                Some((index, value)) if test(&value) => {
                    position.index = Some(index);
                    position.value = Some(value);
                    true
                }
                _ => {
                    position.index = None;
                    position.value = None;
                    false
                }
            }
        }
        (NodeSpec::ForEach { .. }, Position::ForEach(position)) => {
            match position.index.map(|index| index + 1) {
                Some(index) if index < position.collection.len() => {
                    position.value = Some(position.collection[index].clone());
                    position.index = Some(index);
                    true
                }
                _ => {
                    position.index = None;
                    position.value = None;
                    false
                }
            }
        }
        _ => return Err(invalid(node, "loop node without a loop position")),
    };

    if running {
        record.sequence_index = Some(0);
        enter_step(node, game, scope, branch, depth);
        Ok(Signal::Ok)
    } else {
        record.sequence_index = None;
        branch.truncate(depth + 1);
        Ok(Signal::Complete)
    }
}

fn interrupt_loop<G: Game>(
    node: &FlowNode<G>,
    branch: &mut Branch,
    depth: usize,
    scope: &Scope,
    game: &G,
    signal: Signal,
) -> Result<Signal> {
    match signal {
        Signal::Repeat => {
            set_step_index(&mut branch[depth], 0);
            enter_step(node, game, scope, branch, depth);
            Ok(Signal::Ok)
        }
        Signal::Continue => next_iteration(node, branch, depth, scope, game),
        _ => {
            let record = &mut branch[depth];
            match &mut record.position {
                Position::Loop(position) => {
                    position.index = None;
                    position.value = None;
                }
                Position::ForEach(position) => {
                    position.index = None;
                    position.value = None;
                }
                _ => return Err(invalid(node, "loop node without a loop position")),
            }
            record.sequence_index = None;
            branch.truncate(depth + 1);
            Ok(Signal::Complete)
        }
    }
}

fn parallel_mut<'b, G>(node: &FlowNode<G>, record: &'b mut BranchRecord) -> Result<&'b mut ParallelPosition> {
    match &mut record.position {
        Position::Parallel(position) => Ok(position),
        _ => Err(invalid(node, "parallel node without a parallel position")),
    }
}

/// Step the first player branch that can make progress.
fn play_parallel<G: Game>(
    node: &FlowNode<G>,
    body: &FlowNode<G>,
    branch: &mut Branch,
    depth: usize,
    scope: &Scope,
    env: &mut Env<'_, G>,
) -> Result<Signal> {
    let players = parallel_mut(node, &mut branch[depth])?.players.clone();

    for (index, player) in players.iter().enumerate() {
        let mut nested = {
            let position = parallel_mut(node, &mut branch[depth])?;
            if position.completed.get(index).copied().unwrap_or(true) {
                continue;
            }
            match position.branches.get_mut(index) {
                Some(nested) => std::mem::take(nested),
                None => return Err(invalid(node, "missing player branch")),
            }
        };

        let result = play_at(body, &mut nested, 0, &scope.with_player(*player), env);
        let position = parallel_mut(node, &mut branch[depth])?;
        position.branches[index] = nested;

        match result? {
            Signal::Awaiting => continue,
            Signal::Complete => {
                position.completed[index] = true;
                return Ok(if position.all_complete() {
                    Signal::Complete
                } else {
                    Signal::Ok
                });
            }
            other => return Ok(other),
        }
    }

    let position = parallel_mut(node, &mut branch[depth])?;
    Ok(if position.all_complete() {
        Signal::Complete
    } else {
        Signal::Awaiting
    })
}

/// Every action step on the live path that awaits a move.
///
/// Parallel nodes contribute one entry per unfinished player branch.
pub fn awaiting_steps<'n, G>(node: &'n FlowNode<G>, branch: &Branch, scope: &Scope) -> Vec<Located<'n, G>> {
    let mut found = Vec::new();
    let mut path = SmallVec::new();
    collect_awaiting(node, branch, 0, scope, &mut path, &mut found);
    found
}

fn collect_awaiting<'n, G>(
    node: &'n FlowNode<G>,
    branch: &Branch,
    depth: usize,
    scope: &Scope,
    path: &mut SmallVec<[(usize, usize); 2]>,
    found: &mut Vec<Located<'n, G>>,
) {
    let Some(record) = branch.get(depth) else {
        return;
    };
    match (&node.spec, &record.position) {
        (NodeSpec::Action(step), Position::Action(ActionStatus::Awaiting)) => {
            found.push(Located {
                node,
                step,
                path: path.clone(),
                depth,
                scope: scope.clone(),
            });
            return;
        }
        (NodeSpec::Parallel { body, .. }, Position::Parallel(position)) => {
            for (index, nested) in position.branches.iter().enumerate() {
                if position.completed.get(index).copied().unwrap_or(true) {
                    continue;
                }
                let Some(player) = position.players.get(index) else {
                    continue;
                };
                path.push((depth, index));
                collect_awaiting(body, nested, 0, &scope.with_player(*player), path, found);
                path.pop();
            }
            return;
        }
        _ => {}
    }
    if let Some(FlowStep::Node(child)) = current_step(node, record) {
        collect_awaiting(child, branch, depth + 1, &scope.enter(node, record), path, found);
    }
}

fn branch_at_path<'b>(branch: &'b mut Branch, path: &[(usize, usize)]) -> Option<&'b mut Branch> {
    let mut current = branch;
    for &(depth, index) in path {
        current = match current.get_mut(depth).map(|record| &mut record.position) {
            Some(Position::Parallel(position)) => position.branches.get_mut(index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Settle an awaiting action step and enter whatever it runs next.
pub(crate) fn resolve_step<G: Game>(
    root: &mut Branch,
    located: &Located<'_, G>,
    status: ActionStatus,
    game: &G,
) -> Result<()> {
    let node = located.node;
    let branch =
        branch_at_path(root, &located.path).ok_or_else(|| invalid(node, "parallel path no longer exists"))?;
    let record = branch
        .get_mut(located.depth)
        .ok_or_else(|| invalid(node, "action record no longer exists"))?;
    record.position = Position::Action(status);
    record.sequence_index = live_block(node, record).map(|_| 0);
    enter_step(node, game, &located.scope, branch, located.depth);
    Ok(())
}

/// Check that `branch` is a position `node` could be in.
pub fn validate<G>(node: &FlowNode<G>, branch: &Branch) -> std::result::Result<(), String> {
    validate_at(node, branch, 0)
}

fn validate_at<G>(node: &FlowNode<G>, branch: &Branch, depth: usize) -> std::result::Result<(), String> {
    let record = branch
        .get(depth)
        .ok_or_else(|| format!("missing record for {}", node.label()))?;
    if record.name.as_deref() != node.name() {
        return Err(format!(
            "record {depth} is named {:?} but the node is named {:?}",
            record.name,
            node.name()
        ));
    }

    let kind_matches = matches!(
        (&node.spec, &record.position),
        (NodeSpec::Sequence(_), Position::Sequence(_))
            | (NodeSpec::While { .. } | NodeSpec::For { .. }, Position::Loop(_))
            | (NodeSpec::ForEach { .. }, Position::ForEach(_))
            | (NodeSpec::Switch { .. }, Position::Switch(_))
            | (NodeSpec::Action(_), Position::Action(_))
            | (NodeSpec::Parallel { .. }, Position::Parallel(_))
    );
    if !kind_matches {
        return Err(format!("record {depth} is a {} record for {}", record.kind(), node.label()));
    }

    match (&node.spec, &record.position) {
        (NodeSpec::Switch { cases, default, .. }, Position::Switch(position)) => {
            if position.index.is_some_and(|index| index >= cases.len()) {
                return Err(format!("{} has no case {:?}", node.label(), position.index));
            }
            if position.default && (position.index.is_some() || default.is_none()) {
                return Err(format!("{} cannot be in its default block", node.label()));
            }
        }
        (NodeSpec::ForEach { .. }, Position::ForEach(position)) => {
            if position.index.is_some_and(|index| index >= position.collection.len()) {
                return Err(format!("{} index is past its collection", node.label()));
            }
        }
        (NodeSpec::Action(step), Position::Action(ActionStatus::Taken(taken))) => {
            if !step.accepts(&taken.name) {
                return Err(format!("'{}' is not offered by {}", taken.name, node.label()));
            }
        }
        (NodeSpec::Parallel { body, .. }, Position::Parallel(position)) => {
            let count = position.players.len();
            if position.branches.len() != count || position.completed.len() != count {
                return Err(format!("{} branch count does not match its players", node.label()));
            }
            for nested in &position.branches {
                validate_at(body, nested, 0)?;
            }
            return if branch.len() == depth + 1 {
                Ok(())
            } else {
                Err(format!("records follow parallel node {}", node.label()))
            };
        }
        _ => {}
    }

    if let Some(block) = live_block(node, record) {
        if step_index(record) > block.len() {
            return Err(format!("{} step index is out of range", node.label()));
        }
        if !matches!(node.spec, NodeSpec::Sequence(_)) && record.sequence_index.is_none() {
            return Err(format!("{} is missing its sequenceIndex", node.label()));
        }
    }

    match current_step(node, record) {
        Some(FlowStep::Node(child)) => validate_at(child, branch, depth + 1),
        _ if branch.len() == depth + 1 => Ok(()),
        _ => Err(format!("unexpected records after {}", node.label())),
    }
}

//! Game manager.
//!
//! Owns the activation stack and drives it: runs flows until they await a
//! move, validates and applies submitted moves, enters subflows and
//! follow-ups, and persists or restores the whole position.
//!
//! ```
//! use turnflow::actions::{Action, Selection};
//! use turnflow::core::{Args, Game, PlayerId};
//! use turnflow::flow::{actions, sequence, ActionStep};
//! use turnflow::manager::GameManager;
//!
//! #[derive(Default)]
//! struct Coin { calls: Vec<String> }
//!
//! impl Game for Coin {
//!     fn player_count(&self) -> usize { 1 }
//! }
//!
//! let flow = sequence(vec![actions(ActionStep::new().action("call")).named("toss").into()]);
//! let mut manager = GameManager::builder(flow)
//!     .action("call", |_: &Coin, _| {
//!         Action::new()
//!             .choose(Selection::choices("side", vec!["heads", "tails"]))
//!             .then(|coin: &mut Coin, ctx| coin.calls.push(ctx.args["side"].to_string()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mut coin = Coin::default();
//! manager.start(&coin).unwrap();
//! manager.play(&mut coin).unwrap();
//!
//! let mut args = Args::new();
//! args.insert("side".into(), "tails".into());
//! assert_eq!(manager.process_move(&mut coin, PlayerId::new(0), "call", &args).unwrap(), None);
//! assert!(manager.is_finished());
//! assert_eq!(coin.calls, vec!["tails"]);
//! ```

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::actions::{Action, ActionTable, MoveOutcome};
use crate::core::{Args, FlowConfig, FlowError, Game, GameRng, Move, MoveRecord, PlayerId, Result};
use crate::flow::interpreter::{self, Env};
use crate::flow::{
    awaiting_steps, reset, validate, ActionPosition, ActionStatus, Branch, FlowNode, Located, NodeSpec, Scope, Signal,
    SubflowCall, PASS,
};

use super::activation::{Activation, FlowState, GameStatus};
use super::pending::{self, PendingMoves};
use super::registry::{follow_up_flow, FlowRef, FlowRegistry, MAIN_FLOW};

/// Collects flows, actions and configuration for a [`GameManager`].
pub struct GameManagerBuilder<G> {
    registry: FlowRegistry<G>,
    actions: ActionTable<G>,
    config: FlowConfig,
    error: Option<FlowError>,
}

impl<G: Game> GameManagerBuilder<G> {
    /// Declare a subflow that step callbacks may enter by name.
    #[must_use]
    pub fn subflow(mut self, name: impl Into<String>, node: FlowNode<G>) -> Self {
        if let Err(err) = self.registry.add_subflow(name, node) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Declare an action.
    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&G, PlayerId) -> Action<G> + Send + Sync + 'static,
    {
        if let Err(err) = self.actions.register(name, factory) {
            self.error.get_or_insert(err);
        }
        self
    }

    #[must_use]
    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Check the definitions and build the manager.
    ///
    /// Fails on duplicate subflow, node or action names, and on action steps
    /// offering actions that were never declared.
    pub fn build(self) -> Result<GameManager<G>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for (flow, node) in self.registry.declared() {
            check_flow(flow, node, &self.actions)?;
        }

        debug!(
            subflows = self.registry.declared().len() - 1,
            actions = self.actions.len(),
            "game manager built"
        );
        Ok(GameManager {
            rng: GameRng::new(self.config.seed),
            registry: self.registry,
            actions: self.actions,
            config: self.config,
            status: GameStatus::NotStarted,
            stack: Vec::new(),
            history: Vec::new(),
            messages: Vec::new(),
        })
    }
}

fn check_flow<G>(flow: &str, node: &FlowNode<G>, actions: &ActionTable<G>) -> Result<()> {
    let mut names = FxHashSet::default();
    let mut problem = None;
    node.visit(&mut |n| {
        if problem.is_some() {
            return;
        }
        if let Some(name) = n.name() {
            if !names.insert(name) {
                problem = Some(FlowError::DuplicateName(name.to_string()));
                return;
            }
        }
        if let NodeSpec::Action(step) = n.spec() {
            if let Some(choice) = step.choices().iter().find(|c| !actions.contains(c.name())) {
                problem = Some(FlowError::UnknownAction {
                    step: n.label().to_string(),
                    action: choice.name().to_string(),
                });
            }
        }
    });
    match problem {
        Some(err) => {
            warn!(flow, error = %err, "invalid flow definition");
            Err(err)
        }
        None => Ok(()),
    }
}

fn instantiate<G>(
    actions: &ActionTable<G>,
    located: &Located<'_, G>,
    name: &str,
    game: &G,
    player: PlayerId,
) -> Result<Action<G>> {
    actions
        .instantiate(name, game, player)
        .ok_or_else(|| FlowError::UnknownAction {
            step: located.node.label().to_string(),
            action: name.to_string(),
        })
}

/// Runs a game's flow against a host game.
///
/// The manager never owns the host game; every driving call borrows it.
pub struct GameManager<G> {
    registry: FlowRegistry<G>,
    actions: ActionTable<G>,
    config: FlowConfig,
    status: GameStatus,
    /// Bottom to top. Only the top activation runs.
    stack: Vec<Activation>,
    rng: GameRng,
    history: Vec<MoveRecord>,
    messages: Vec<String>,
}

impl<G: Game> GameManager<G> {
    pub fn builder(main: FlowNode<G>) -> GameManagerBuilder<G> {
        GameManagerBuilder {
            registry: FlowRegistry::new(main),
            actions: ActionTable::new(),
            config: FlowConfig::default(),
            error: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Accepted moves, oldest first.
    #[must_use]
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// Take the messages produced by accepted moves since the last call.
    pub fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    #[must_use]
    pub fn stack(&self) -> &[Activation] {
        &self.stack
    }

    /// Flow run by the top activation.
    #[must_use]
    pub fn current_flow(&self) -> Option<&FlowRef> {
        self.stack.last().map(|a| &a.flow)
    }

    /// Branch of the top activation.
    #[must_use]
    pub fn branch(&self) -> Option<&Branch> {
        self.stack.last().map(|a| &a.branch)
    }

    /// Arguments the top activation was entered with.
    #[must_use]
    pub fn flow_args(&self) -> Option<&Args> {
        self.stack.last().map(|a| &a.args)
    }

    /// The game's RNG, for host setup such as shuffling before the first move.
    pub fn rng_mut(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    /// Activate the main flow.
    pub fn start(&mut self, game: &G) -> Result<()> {
        if self.status != GameStatus::NotStarted {
            return Err(FlowError::AlreadyStarted);
        }
        let node = self.registry.get(&FlowRef::Main)?;
        let branch = reset(node, game, &Scope::default());
        self.stack.push(Activation {
            flow: FlowRef::Main,
            args: Args::new(),
            branch,
        });
        self.status = GameStatus::Playing;
        info!(seed = self.config.seed, players = game.player_count(), "game started");
        Ok(())
    }

    fn ensure_playing(&self) -> Result<()> {
        match self.status {
            GameStatus::NotStarted => Err(FlowError::NotStarted),
            GameStatus::Finished => Err(FlowError::Finished),
            GameStatus::Playing => Ok(()),
        }
    }

    fn finish(&mut self) {
        self.status = GameStatus::Finished;
        info!(moves = self.history.len(), "game finished");
    }

    /// Advance the top activation by one unit.
    ///
    /// Returns `Complete` once the whole game has finished, `Awaiting` when
    /// the top flow waits for a move, and `Ok` otherwise.
    pub fn play_one_step(&mut self, game: &mut G) -> Result<Signal> {
        match self.status {
            GameStatus::NotStarted => return Err(FlowError::NotStarted),
            GameStatus::Finished => return Ok(Signal::Complete),
            GameStatus::Playing => {}
        }
        if self.stack.is_empty() {
            self.finish();
            return Ok(Signal::Complete);
        }

        let (signal, subflows) = {
            let Some(top) = self.stack.last_mut() else {
                return Ok(Signal::Complete);
            };
            let node = self.registry.get(&top.flow)?;
            let scope = Scope::new(top.args.clone());
            let mut env = Env::new(&mut *game, &mut self.rng);
            let signal = interpreter::play(node, &mut top.branch, &scope, &mut env)?;
            if signal.is_interrupt() {
                return Err(FlowError::UnhandledInterrupt {
                    signal: signal.to_string(),
                    flow: top.flow.to_string(),
                });
            }
            (signal, env.subflows)
        };

        if signal == Signal::Complete {
            if let Some(done) = self.stack.pop() {
                debug!(flow = %done.flow, "flow complete");
                if let FlowRef::FollowUp { id, .. } = done.flow {
                    self.registry.remove_follow_up(id);
                }
            }
        }
        for call in subflows.into_iter().rev() {
            self.enter_subflow(game, call)?;
        }

        if self.stack.is_empty() {
            self.finish();
            return Ok(Signal::Complete);
        }
        Ok(match signal {
            Signal::Complete => Signal::Ok,
            other => other,
        })
    }

    fn enter_subflow(&mut self, game: &G, call: SubflowCall) -> Result<()> {
        let flow = FlowRef::Subflow { name: call.name };
        let node = self.registry.get(&flow)?;
        let branch = reset(node, game, &Scope::new(call.args.clone()));
        debug!(flow = %flow, "entering subflow");
        self.stack.push(Activation {
            flow,
            args: call.args,
            branch,
        });
        Ok(())
    }

    /// Run until a move is needed or the game ends.
    ///
    /// Action steps nobody can play are skipped on the way.
    pub fn play(&mut self, game: &mut G) -> Result<()> {
        let limit = self.config.max_steps_per_play;
        for _ in 0..limit {
            let signal = self.play_one_step(game)?;
            if self.is_finished() {
                return Ok(());
            }
            if signal == Signal::Awaiting && !self.skip_unplayable(game)? {
                return Ok(());
            }
        }
        warn!(limit, "flow did not settle");
        Err(FlowError::StepLimit(limit))
    }

    /// Mark awaiting steps with no playable move as skipped.
    fn skip_unplayable(&mut self, game: &G) -> Result<bool> {
        let Some(top) = self.stack.last_mut() else {
            return Ok(false);
        };
        let node = self.registry.get(&top.flow)?;
        let scope = Scope::new(top.args.clone());
        let mut skipped = false;
        for located in awaiting_steps(node, &top.branch, &scope) {
            if located.step.is_optional() {
                continue;
            }
            let playable = located
                .eligible_players(game)
                .into_iter()
                .any(|player| pending::is_playable(&self.actions, game, &located, player));
            if !playable {
                debug!(flow = %top.flow, step = located.node.label(), "no playable moves, skipping step");
                interpreter::resolve_step(&mut top.branch, &located, ActionStatus::Skipped, game)?;
                skipped = true;
            }
        }
        Ok(skipped)
    }

    /// Players who can make a move right now.
    #[must_use]
    pub fn awaiting_players(&self, game: &G) -> Vec<PlayerId> {
        if self.status != GameStatus::Playing {
            return Vec::new();
        }
        let Some(top) = self.stack.last() else {
            return Vec::new();
        };
        let Ok(node) = self.registry.get(&top.flow) else {
            return Vec::new();
        };
        let scope = Scope::new(top.args.clone());
        let mut players = Vec::new();
        for located in awaiting_steps(node, &top.branch, &scope) {
            for player in located.eligible_players(game) {
                if pending::is_playable(&self.actions, game, &located, player) {
                    players.push(player);
                }
            }
        }
        players.sort_unstable();
        players.dedup();
        players
    }

    /// Moves `player` may continue right now.
    ///
    /// With `name`, lists only that action's moves, continued from `args`.
    /// Returns `None` when the player has nothing to do.
    #[must_use]
    pub fn pending_moves(
        &self,
        game: &G,
        player: PlayerId,
        name: Option<&str>,
        args: Option<&Args>,
    ) -> Option<PendingMoves> {
        if self.status != GameStatus::Playing {
            return None;
        }
        let top = self.stack.last()?;
        let node = self.registry.get(&top.flow).ok()?;
        let scope = Scope::new(top.args.clone());
        let awaiting = awaiting_steps(node, &top.branch, &scope);
        let located = awaiting.iter().find(|l| l.eligible_players(game).contains(&player))?;
        pending::collect(&self.actions, game, located, player, name, args)
    }

    /// Validate and apply a move, then play on until the next move is needed.
    ///
    /// A rejected move leaves everything untouched and returns the reason as
    /// `Ok(Some(message))`. Errors are reserved for protocol violations.
    pub fn process_move(
        &mut self,
        game: &mut G,
        player: PlayerId,
        name: &str,
        args: &Args,
    ) -> Result<Option<String>> {
        self.ensure_playing()?;
        let outcome = {
            let top = self.stack.last_mut().ok_or(FlowError::NotAwaiting)?;
            let node = self.registry.get(&top.flow)?;
            let scope = Scope::new(top.args.clone());
            let awaiting = awaiting_steps(node, &top.branch, &scope);
            if awaiting.is_empty() {
                return Err(FlowError::NotAwaiting);
            }
            let Some(located) = awaiting.iter().find(|l| l.eligible_players(game).contains(&player)) else {
                return Err(FlowError::IneligiblePlayer { player });
            };

            let outcome = if name == PASS {
                if !located.step.is_optional() {
                    return Ok(Some(format!("{} cannot be passed", located.node.label())));
                }
                MoveOutcome::default()
            } else {
                let Some(choice) = located.step.choice(name) else {
                    debug!(%player, action = name, "action not offered");
                    return Ok(Some(format!("{name} is not available")));
                };
                let action = instantiate(&self.actions, located, name, game, player)?;
                let submitted = pending::merged_args(choice, Some(args));
                match action.process(game, &mut self.rng, player, &submitted) {
                    Ok(outcome) => outcome,
                    Err(message) => {
                        debug!(%player, action = name, %message, "move rejected");
                        return Ok(Some(message));
                    }
                }
            };

            let taken = ActionPosition {
                player,
                name: name.to_string(),
                args: outcome.args.clone(),
            };
            interpreter::resolve_step(&mut top.branch, located, ActionStatus::Taken(taken), game)?;
            outcome
        };

        info!(%player, action = name, "move accepted");
        self.record(Move::new(player, name).with_args(outcome.args.clone()));
        self.apply_outcome(game, outcome)?;
        self.play(game)?;
        Ok(None)
    }

    /// Submit a recorded move.
    pub fn submit(&mut self, game: &mut G, mv: &Move) -> Result<Option<String>> {
        self.process_move(game, mv.player, &mv.name, &mv.args)
    }

    /// Apply a move without validating its selections.
    ///
    /// The action must still be offered at an awaiting step. Administrative
    /// moves are not recorded in the history.
    pub fn force_move(&mut self, game: &mut G, player: PlayerId, name: &str, args: &Args) -> Result<()> {
        if !self.config.allow_god_mode {
            return Err(FlowError::GodModeDisabled);
        }
        self.ensure_playing()?;
        let outcome = {
            let top = self.stack.last_mut().ok_or(FlowError::NotAwaiting)?;
            let node = self.registry.get(&top.flow)?;
            let scope = Scope::new(top.args.clone());
            let awaiting = awaiting_steps(node, &top.branch, &scope);
            let located = awaiting
                .iter()
                .find(|l| l.eligible_players(game).contains(&player))
                .or_else(|| awaiting.first())
                .ok_or(FlowError::NotAwaiting)?;
            if !located.step.accepts(name) {
                return Err(FlowError::UnknownAction {
                    step: located.node.label().to_string(),
                    action: name.to_string(),
                });
            }

            let outcome = match located.step.choice(name) {
                Some(choice) => {
                    let action = instantiate(&self.actions, located, name, game, player)?;
                    action.execute(game, &mut self.rng, player, pending::merged_args(choice, Some(args)))
                }
                None => MoveOutcome::default(),
            };
            warn!(%player, action = name, "administrative move applied");

            let taken = ActionPosition {
                player,
                name: name.to_string(),
                args: outcome.args.clone(),
            };
            interpreter::resolve_step(&mut top.branch, located, ActionStatus::Taken(taken), game)?;
            outcome
        };

        self.apply_outcome(game, outcome)?;
        self.play(game)
    }

    fn record(&mut self, mv: Move) {
        if self.config.record_history {
            let sequence = u32::try_from(self.history.len()).unwrap_or(u32::MAX);
            self.history.push(MoveRecord::new(mv, sequence));
        }
    }

    /// Keep messages and stack follow-ups so the first one runs first.
    fn apply_outcome(&mut self, game: &G, outcome: MoveOutcome) -> Result<()> {
        for message in &outcome.messages {
            debug!(%message, "move message");
        }
        self.messages.extend(outcome.messages);

        for follow_up in outcome.follow_ups.into_iter().rev() {
            if !self.actions.contains(&follow_up.name) {
                return Err(FlowError::UnknownAction {
                    step: "follow-up".to_string(),
                    action: follow_up.name,
                });
            }
            let flow = self.registry.add_follow_up(follow_up);
            let node = self.registry.get(&flow)?;
            let branch = reset(node, game, &Scope::default());
            debug!(flow = %flow, "follow-up queued");
            self.stack.push(Activation {
                flow,
                args: Args::new(),
                branch,
            });
        }
        Ok(())
    }

    /// Start over and resubmit `moves`.
    ///
    /// `game` must be in its initial state. Same seed and same moves give
    /// the same position.
    pub fn replay(&mut self, game: &mut G, moves: &[Move]) -> Result<()> {
        self.status = GameStatus::NotStarted;
        self.stack.clear();
        self.rng = GameRng::new(self.config.seed);
        self.history.clear();
        self.messages.clear();
        self.registry.clear_follow_ups();

        self.start(game)?;
        self.play(game)?;
        for (index, mv) in moves.iter().enumerate() {
            if let Some(message) = self.submit(game, mv)? {
                warn!(index, %message, "replay rejected");
                return Err(FlowError::ReplayRejected { index, message });
            }
        }
        info!(moves = moves.len(), "replay complete");
        Ok(())
    }

    /// Snapshot the flow position.
    #[must_use]
    pub fn state(&self) -> FlowState {
        FlowState {
            status: self.status,
            stack: self.stack.clone(),
            rng: self.rng.state(),
            next_follow_up: self.registry.next_follow_up(),
            history: self.history.clone(),
        }
    }

    /// Resume from a snapshot taken with [`state`](Self::state).
    ///
    /// Every branch is checked against its flow first; on failure nothing
    /// changes.
    pub fn restore(&mut self, state: FlowState) -> Result<()> {
        if state.status == GameStatus::Playing && state.stack.is_empty() {
            return Err(FlowError::InvalidBranch {
                flow: MAIN_FLOW.to_string(),
                reason: "no active flow".to_string(),
            });
        }
        for activation in &state.stack {
            let rebuilt;
            let node = match &activation.flow {
                FlowRef::FollowUp { id, follow_up } => {
                    if !self.actions.contains(&follow_up.name) {
                        return Err(FlowError::UnknownAction {
                            step: activation.flow.to_string(),
                            action: follow_up.name.clone(),
                        });
                    }
                    rebuilt = follow_up_flow(*id, follow_up);
                    &rebuilt
                }
                flow => self.registry.get(flow)?,
            };
            validate(node, &activation.branch).map_err(|reason| FlowError::InvalidBranch {
                flow: activation.flow.to_string(),
                reason,
            })?;
        }

        self.registry.clear_follow_ups();
        for activation in &state.stack {
            if let FlowRef::FollowUp { id, follow_up } = &activation.flow {
                self.registry.restore_follow_up(*id, follow_up);
            }
        }
        self.registry.set_next_follow_up(state.next_follow_up);
        self.rng = GameRng::from_state(&state.rng);
        self.status = state.status;
        self.stack = state.stack;
        self.history = state.history;
        self.messages.clear();
        info!(status = ?self.status, depth = self.stack.len(), "flow state restored");
        Ok(())
    }

    /// Snapshot as JSON.
    pub fn save_json(&self) -> Result<String> {
        self.state().to_json()
    }

    /// Restore from JSON produced by [`save_json`](Self::save_json).
    pub fn restore_json(&mut self, json: &str) -> Result<()> {
        self.restore(FlowState::from_json(json)?)
    }
}

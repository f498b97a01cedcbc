//! Actions: named moves built from ordered selections.
//!
//! An [`Action`] knows three things about a move:
//!
//! - what the player still has to choose ([`Action::next_selection`]),
//! - which partial moves can still be completed ([`Action::pending_moves`]),
//! - whether a committed move is valid, and what it does
//!   ([`Action::process`]).
//!
//! ## Pending-move search
//!
//! The search walks the selections in order. A selection whose legal values
//! can be listed is expanded value by value and the rest of the move is
//! searched below each value; values that lead nowhere are pruned. The
//! search stops at the first selection whose values cannot be listed and
//! hands it to the player as is.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Argument, Args, GameRng, PlayerId};

use super::message::render;
use super::resolved::{ResolvedSelection, SkipIf};
use super::selection::Selection;

/// Action step callback.
pub type ActionFn<G> = Arc<dyn Fn(&mut G, &mut MoveContext<'_>) + Send + Sync>;

/// Availability predicate.
pub type Condition<G> = Arc<dyn Fn(&G) -> bool + Send + Sync>;

/// An action to be offered right after the current one, ahead of the flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub player: PlayerId,
    pub name: String,
    #[serde(default)]
    pub args: Args,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl FollowUp {
    pub fn new(player: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player,
            name: name.into(),
            args: Args::new(),
            prompt: None,
        }
    }

    /// Prefill an argument of the follow-up action.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Everything an action step callback may touch besides the game.
pub struct MoveContext<'a> {
    /// The acting player.
    pub player: PlayerId,
    /// Committed arguments, with skipped selections filled in.
    pub args: &'a Args,
    pub rng: &'a mut GameRng,
    follow_ups: Vec<FollowUp>,
    messages: Vec<String>,
}

impl<'a> MoveContext<'a> {
    pub fn new(player: PlayerId, args: &'a Args, rng: &'a mut GameRng) -> Self {
        Self {
            player,
            args,
            rng,
            follow_ups: Vec::new(),
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    /// Queue an action to run right after this one.
    pub fn follow_up(&mut self, follow_up: FollowUp) {
        self.follow_ups.push(follow_up);
    }

    /// Emit a message. `{{name}}` placeholders are filled from the arguments.
    pub fn message(&mut self, template: &str) {
        self.messages.push(render(template, self.player, self.args));
    }
}

/// A partial move that can still be completed.
///
/// `selections` is empty when the move is complete and can be submitted
/// as is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingMove {
    pub name: String,
    pub args: Args,
    pub selections: Vec<ResolvedSelection>,
}

impl PendingMove {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.selections.is_empty()
    }
}

/// Effects of an accepted move.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveOutcome {
    /// Arguments as executed, with skipped selections filled in.
    pub args: Args,
    pub follow_ups: Vec<FollowUp>,
    pub messages: Vec<String>,
}

/// A declared move.
pub struct Action<G> {
    pub(crate) name: String,
    prompt: Option<String>,
    condition: Option<Condition<G>>,
    selections: Vec<Selection<G>>,
    steps: Vec<ActionFn<G>>,
    messages: Vec<String>,
}

impl<G> Default for Action<G> {
    fn default() -> Self {
        Self {
            name: String::new(),
            prompt: None,
            condition: None,
            selections: Vec::new(),
            steps: Vec::new(),
            messages: Vec::new(),
        }
    }
}

impl<G> Action<G> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Offer the action only while `condition` holds.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&G) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Append a selection.
    #[must_use]
    pub fn choose(mut self, selection: Selection<G>) -> Self {
        self.selections.push(selection);
        self
    }

    /// Append a step callback, run when the move is accepted.
    #[must_use]
    pub fn then<F>(mut self, step: F) -> Self
    where
        F: Fn(&mut G, &mut MoveContext<'_>) + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Announce the move with a template once it is accepted.
    #[must_use]
    pub fn message(mut self, template: impl Into<String>) -> Self {
        self.messages.push(template.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    #[must_use]
    pub fn selections(&self) -> &[Selection<G>] {
        &self.selections
    }

    #[must_use]
    pub fn is_available(&self, game: &G) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition(game))
    }

    fn next_selection_at(&self, game: &G, args: &mut Args) -> Option<(usize, ResolvedSelection)> {
        for (index, selection) in self.selections.iter().enumerate() {
            if args.contains_key(selection.name()) {
                continue;
            }
            let resolved = selection.resolve(game, args);
            match resolved.skipped_value() {
                Some(value) => {
                    args.insert(selection.name().to_string(), value);
                }
                None => return Some((index, resolved)),
            }
        }
        None
    }

    /// The first selection the player still has to answer.
    ///
    /// Selections that are skipped have their forced value written into
    /// `args` on the way. Skipping is re-evaluated on every call since
    /// earlier values change what remains legal.
    pub fn next_selection(&self, game: &G, args: &mut Args) -> Option<ResolvedSelection> {
        self.next_selection_at(game, args).map(|(_, resolved)| resolved)
    }

    /// Every way the move can continue from `args`.
    ///
    /// Returns `None` when the action cannot be completed from here.
    pub fn pending_moves(&self, game: &G, args: &Args) -> Option<Vec<PendingMove>> {
        if !self.is_available(game) {
            return None;
        }
        self.search(game, args.clone())
    }

    fn search(&self, game: &G, mut args: Args) -> Option<Vec<PendingMove>> {
        let Some((index, mut selection)) = self.next_selection_at(game, &mut args) else {
            let mut checked = args.clone();
            return match self.validation_error(game, &mut checked) {
                None => Some(vec![PendingMove {
                    name: self.name.clone(),
                    args,
                    selections: Vec::new(),
                }]),
                Some(_) => None,
            };
        };

        if !selection.is_possible() {
            return None;
        }
        if !selection.is_bounded() {
            return Some(vec![PendingMove {
                name: self.name.clone(),
                args,
                selections: vec![selection],
            }]);
        }

        let declared = &self.selections[index];
        let mut viable = Vec::new();
        let mut continuations = Vec::new();
        for option in selection.options() {
            let mut next = args.clone();
            next.insert(selection.name.clone(), option.clone());
            if declared.custom_error(game, &next).is_some() {
                continue;
            }
            if let Some(moves) = self.search(game, next) {
                viable.push(option);
                continuations.push(moves);
            }
        }

        match viable.len() {
            0 => None,
            1 if selection.skip_if != SkipIf::Never => continuations.pop(),
            _ => {
                selection.restrict_to(&viable);
                Some(vec![PendingMove {
                    name: self.name.clone(),
                    args,
                    selections: vec![selection],
                }])
            }
        }
    }

    /// Check every selection against `args`, filling skipped ones in.
    ///
    /// Returns the first error.
    pub fn validation_error(&self, game: &G, args: &mut Args) -> Option<String> {
        for selection in &self.selections {
            if !args.contains_key(selection.name()) {
                match selection.resolve(game, args).skipped_value() {
                    Some(value) => {
                        args.insert(selection.name().to_string(), value);
                    }
                    None => return Some(format!("{} is required", selection.name())),
                }
            }
            if let Some(error) = selection.error(game, args) {
                return Some(error);
            }
        }
        None
    }

    /// Validate and execute a committed move.
    ///
    /// Player mistakes come back as `Err(message)`; nothing is executed.
    pub fn process(
        &self,
        game: &mut G,
        rng: &mut GameRng,
        player: PlayerId,
        args: &Args,
    ) -> Result<MoveOutcome, String> {
        if !self.is_available(game) {
            return Err(format!("{} is not available", self.name));
        }
        let mut args = args.clone();
        if let Some(error) = self.validation_error(game, &mut args) {
            return Err(error);
        }
        Ok(self.execute(game, rng, player, args))
    }

    /// Run the step callbacks and messages without any validation.
    pub fn execute(&self, game: &mut G, rng: &mut GameRng, player: PlayerId, args: Args) -> MoveOutcome {
        let (follow_ups, messages) = {
            let mut ctx = MoveContext::new(player, &args, rng);
            for step in &self.steps {
                step(game, &mut ctx);
            }
            for template in &self.messages {
                ctx.message(template);
            }
            (ctx.follow_ups, ctx.messages)
        };
        MoveOutcome {
            args,
            follow_ups,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::resolved::ResolvedKind;
    use crate::core::args;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Market {
        stock: Vec<&'static str>,
        taken: Vec<String>,
    }

    fn number_of(args: &Args, key: &str) -> i64 {
        args.get(key).and_then(Argument::as_number).unwrap_or(0)
    }

    fn stock(market: &Market, _: &Args) -> Vec<crate::actions::Choice> {
        market.stock.iter().map(|&s| s.into()).collect()
    }

    fn take() -> Action<Market> {
        Action::new()
            .prompt("Take a resource")
            .choose(Selection::choices_with("resource", stock))
            .then(|market: &mut Market, ctx: &mut MoveContext<'_>| {
                if let Some(resource) = ctx.arg("resource") {
                    market.taken.push(resource.to_string());
                }
            })
            .message("{{player}} took {{resource}}")
    }

    fn named(mut action: Action<Market>, name: &str) -> Action<Market> {
        action.name = name.to_string();
        action
    }

    #[test]
    fn test_dependent_number_selection() {
        let action: Action<Market> = named(
            Action::new()
                .choose(Selection::number("n").min(0).max(3))
                .choose(
                    Selection::number("m")
                        .min_with(|_, a: &Args| number_of(a, "n"))
                        .max_with(|_, a: &Args| number_of(a, "n") * 2),
                ),
            "split",
        );
        let market = Market::default();

        let moves = action
            .pending_moves(&market, &args([("n", Argument::Number(1))]))
            .unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].selections[0].name, "m");
        assert_eq!(moves[0].selections[0].kind, ResolvedKind::Number { min: 1, max: Some(2) });
    }

    #[test]
    fn test_only_one_choice_is_skipped() {
        let market = Market {
            stock: vec!["oil"],
            ..Market::default()
        };
        let action = named(take(), "take");

        let mut partial = Args::new();
        assert_eq!(action.next_selection(&market, &mut partial), None);
        assert_eq!(partial.get("resource"), Some(&"oil".into()));

        let moves = action.pending_moves(&market, &Args::new()).unwrap();
        assert_eq!(moves.len(), 1);
        assert!(moves[0].is_complete());
        assert_eq!(moves[0].args.get("resource"), Some(&"oil".into()));
    }

    #[test]
    fn test_never_skip_keeps_single_choice() {
        let market = Market {
            stock: vec!["oil"],
            ..Market::default()
        };
        let action: Action<Market> = named(
            Action::new().choose(Selection::choices_with("resource", stock).skip_if(SkipIf::Never)),
            "take",
        );

        let moves = action.pending_moves(&market, &Args::new()).unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].selections.len(), 1);
        assert_eq!(moves[0].selections[0].options(), vec!["oil".into()]);
    }

    #[test]
    fn test_no_choices_is_unplayable() {
        let action = named(take(), "take");
        assert_eq!(action.pending_moves(&Market::default(), &Args::new()), None);
    }

    #[test]
    fn test_condition_hides_action() {
        let action: Action<Market> = named(take().condition(|m: &Market| m.stock.len() > 1), "take");
        let market = Market {
            stock: vec!["oil"],
            ..Market::default()
        };
        assert_eq!(action.pending_moves(&market, &Args::new()), None);
    }

    #[test]
    fn test_search_prunes_dead_options() {
        // second pick must differ from the first; only 'b' leaves a legal second pick
        let action: Action<Market> = named(
            Action::new()
                .choose(Selection::choices("first", vec!["a", "b"]))
                .choose(Selection::choices_with("second", |_, a: &Args| {
                    match a.get("first").and_then(Argument::as_text) {
                        Some("a") => vec![],
                        _ => vec!["c".into()],
                    }
                })),
            "pair",
        );

        let moves = action.pending_moves(&Market::default(), &Args::new()).unwrap();
        assert_eq!(moves.len(), 1);
        assert!(moves[0].is_complete());
        assert_eq!(moves[0].args, args([("first", "b".into()), ("second", "c".into())]));
    }

    #[test]
    fn test_search_narrows_viable_options() {
        let action: Action<Market> = named(
            Action::new()
                .choose(Selection::choices("first", vec!["a", "b", "c"]))
                .choose(Selection::choices_with("second", |_, a: &Args| {
                    match a.get("first").and_then(Argument::as_text) {
                        Some("a") => vec![],
                        _ => vec!["x".into(), "y".into()],
                    }
                })),
            "pair",
        );

        let moves = action.pending_moves(&Market::default(), &Args::new()).unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].selections[0].options(), vec!["b".into(), "c".into()]);
    }

    #[test]
    fn test_search_stops_at_unbounded_selection() {
        let action: Action<Market> = named(
            Action::new()
                .choose(Selection::choices("kind", vec!["bid"]))
                .choose(Selection::number("amount")),
            "bid",
        );
        let moves = action.pending_moves(&Market::default(), &Args::new()).unwrap();
        assert_eq!(moves[0].args.get("kind"), Some(&"bid".into()));
        assert_eq!(moves[0].selections[0].name, "amount");
        assert!(!moves[0].selections[0].is_bounded());
    }

    #[test]
    fn test_validator_prunes_options() {
        let action: Action<Market> = named(
            Action::new().choose(Selection::number("n").min(1).max(4).validate(|_, a: &Args| {
                (number_of(a, "n") % 2 == 1).then(|| "even only".to_string())
            })),
            "even",
        );
        let moves = action.pending_moves(&Market::default(), &Args::new()).unwrap();
        assert_eq!(moves[0].selections[0].kind, ResolvedKind::Number { min: 2, max: Some(4) });
    }

    #[test]
    fn test_process_executes_and_renders_messages() {
        let mut market = Market {
            stock: vec!["oil", "wheat"],
            ..Market::default()
        };
        let action = named(take(), "take");
        let mut rng = GameRng::new(3);

        let outcome = action
            .process(&mut market, &mut rng, PlayerId::new(1), &args([("resource", "wheat".into())]))
            .unwrap();
        assert_eq!(market.taken, vec!["wheat"]);
        assert_eq!(outcome.messages, vec!["Player 1 took wheat"]);
        assert!(outcome.follow_ups.is_empty());
    }

    #[test]
    fn test_process_rejects_without_side_effects() {
        let mut market = Market {
            stock: vec!["oil", "wheat"],
            ..Market::default()
        };
        let action = named(take(), "take");
        let mut rng = GameRng::new(3);

        let error = action
            .process(&mut market, &mut rng, PlayerId::new(0), &args([("resource", "gold".into())]))
            .unwrap_err();
        assert_eq!(error, "'gold' is not a valid choice for resource");

        let error = action
            .process(&mut market, &mut rng, PlayerId::new(0), &Args::new())
            .unwrap_err();
        assert_eq!(error, "resource is required");
        assert!(market.taken.is_empty());
    }

    #[test]
    fn test_process_fills_forced_values() {
        let mut market = Market {
            stock: vec!["oil"],
            ..Market::default()
        };
        let action = named(take(), "take");
        let mut rng = GameRng::new(3);
        let outcome = action
            .process(&mut market, &mut rng, PlayerId::new(0), &Args::new())
            .unwrap();
        assert_eq!(outcome.args.get("resource"), Some(&"oil".into()));
        assert_eq!(market.taken, vec!["oil"]);
    }

    #[test]
    fn test_follow_ups_are_collected() {
        let action: Action<Market> = named(
            Action::new().then(|_: &mut Market, ctx: &mut MoveContext<'_>| {
                let next = FollowUp::new(ctx.player, "discard").with_arg("count", 2).prompt("Discard two");
                ctx.follow_up(next);
            }),
            "draw",
        );
        let outcome = action.execute(&mut Market::default(), &mut GameRng::new(0), PlayerId::new(1), Args::new());
        assert_eq!(
            outcome.follow_ups,
            vec![FollowUp {
                player: PlayerId::new(1),
                name: "discard".into(),
                args: args([("count", 2.into())]),
                prompt: Some("Discard two".into()),
            }]
        );
    }
}

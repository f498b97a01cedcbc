//! Pending moves offered at an awaiting step.

use serde::Serialize;

use crate::actions::{ActionTable, Choice, PendingMove, ResolvedKind, ResolvedSelection, SkipIf};
use crate::core::{Args, Game, PlayerId};
use crate::flow::{Located, StepAction, PASS};

/// Name of the synthetic move that picks between several actions.
pub const CHOOSE: &str = "__choose__";

/// Selection name used by the [`CHOOSE`] move.
pub const CHOOSE_SELECTION: &str = "action";

/// What a player can do at the step awaiting them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingMoves {
    /// Name of the awaiting step, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub moves: Vec<PendingMove>,
}

impl PendingMoves {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PendingMove> {
        self.moves.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.moves.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Submitted arguments with the step's prefilled values on top.
pub(crate) fn merged_args<G>(choice: &StepAction<G>, submitted: Option<&Args>) -> Args {
    let mut args = submitted.cloned().unwrap_or_default();
    for (key, value) in choice.prefilled() {
        args.insert(key.clone(), value.clone());
    }
    args
}

/// Can `player` complete any move at `located`?
pub(crate) fn is_playable<G: Game>(
    actions: &ActionTable<G>,
    game: &G,
    located: &Located<'_, G>,
    player: PlayerId,
) -> bool {
    located.step.is_optional()
        || located.step.choices().iter().any(|choice| {
            actions
                .instantiate(choice.name(), game, player)
                .and_then(|action| action.pending_moves(game, &merged_args(choice, None)))
                .is_some()
        })
}

/// Moves `player` may continue at `located`.
///
/// Without a name, several playable actions that are not expanded fold into
/// one [`CHOOSE`] move. With a name, only that action's moves are listed,
/// continued from `args`. Without one, `args` only apply when the step
/// offers a single action.
pub(crate) fn collect<G: Game>(
    actions: &ActionTable<G>,
    game: &G,
    located: &Located<'_, G>,
    player: PlayerId,
    name: Option<&str>,
    args: Option<&Args>,
) -> Option<PendingMoves> {
    let step = located.step;
    let partial = args.filter(|_| name.is_some() || step.choices().len() == 1);
    let mut moves = Vec::new();
    let mut folded: Vec<(Choice, Vec<PendingMove>)> = Vec::new();

    for choice in step.choices() {
        if name.is_some_and(|n| n != choice.name()) {
            continue;
        }
        let Some(action) = actions.instantiate(choice.name(), game, player) else {
            continue;
        };
        let Some(pending) = action.pending_moves(game, &merged_args(choice, partial)) else {
            continue;
        };
        if name.is_some() || choice.is_expanded() {
            moves.extend(pending);
        } else {
            let label = action.prompt_text().unwrap_or(choice.name());
            folded.push((Choice::new(choice.name(), label), pending));
        }
    }

    if folded.len() > 1 {
        let choices = folded.into_iter().map(|(choice, _)| choice).collect();
        moves.push(PendingMove {
            name: CHOOSE.to_string(),
            args: Args::new(),
            selections: vec![ResolvedSelection {
                name: CHOOSE_SELECTION.to_string(),
                prompt: step.prompt_text().map(str::to_string),
                kind: ResolvedKind::Choices { choices },
                skip_if: SkipIf::Never,
                confirm: None,
            }],
        });
    } else {
        moves.extend(folded.into_iter().flat_map(|(_, pending)| pending));
    }

    if step.is_optional() && name.map_or(true, |n| n == PASS) {
        moves.push(PendingMove {
            name: PASS.to_string(),
            args: Args::new(),
            selections: Vec::new(),
        });
    }

    if moves.is_empty() {
        return None;
    }
    Some(PendingMoves {
        step: located.node.name().map(str::to_string),
        prompt: step.prompt_text().map(str::to_string),
        moves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, Selection};
    use crate::core::{args, Argument};
    use crate::flow::{actions as action_node, awaiting_steps, reset, ActionStep, FlowNode, Scope};
    use pretty_assertions::assert_eq;

    struct Market {
        stock: Vec<&'static str>,
    }

    impl Game for Market {
        fn player_count(&self) -> usize {
            2
        }
    }

    fn table() -> ActionTable<Market> {
        let mut table = ActionTable::new();
        table
            .register("take", |market: &Market, _| {
                let stock = market.stock.clone();
                Action::new().prompt("Take a resource").choose(Selection::choices("resource", stock))
            })
            .unwrap();
        table
            .register("rest", |_: &Market, _| Action::new().prompt("Rest"))
            .unwrap();
        table
            .register("trade", |_: &Market, _| {
                Action::new().choose(Selection::choices("offer", Vec::<&str>::new()))
            })
            .unwrap();
        table
    }

    fn pending(node: &FlowNode<Market>, market: &Market, name: Option<&str>) -> Option<PendingMoves> {
        pending_from(node, market, name, None)
    }

    fn pending_from(
        node: &FlowNode<Market>,
        market: &Market,
        name: Option<&str>,
        args: Option<&Args>,
    ) -> Option<PendingMoves> {
        let branch = reset(node, market, &Scope::default());
        let located = awaiting_steps(node, &branch, &Scope::default());
        collect(&table(), market, &located[0], PlayerId::new(0), name, args)
    }

    #[test]
    fn test_several_actions_fold_into_choose() {
        let market = Market { stock: vec!["oil", "wood"] };
        let node = action_node(ActionStep::new().prompt("Your turn").action("take").action("rest")).named("turn");

        let moves = pending(&node, &market, None).unwrap();
        assert_eq!(moves.step.as_deref(), Some("turn"));
        assert_eq!(moves.names(), vec![CHOOSE]);

        let selection = &moves.moves[0].selections[0];
        assert_eq!(selection.skip_if, SkipIf::Never);
        let ResolvedKind::Choices { choices } = &selection.kind else {
            panic!("expected a choices selection");
        };
        assert_eq!(choices[0], Choice::new("take", "Take a resource"));
        assert_eq!(choices[1], Choice::new("rest", "Rest"));
    }

    #[test]
    fn test_named_action_lists_its_moves() {
        let market = Market { stock: vec!["oil", "wood"] };
        let node = action_node(ActionStep::new().action("take").action("rest"));

        let moves = pending(&node, &market, Some("take")).unwrap();
        assert_eq!(moves.names(), vec!["take"]);
        assert_eq!(moves.moves[0].selections[0].name, "resource");
    }

    #[test]
    fn test_unplayable_actions_are_dropped() {
        let market = Market { stock: vec!["oil"] };
        let node = action_node(ActionStep::new().action("take").action("trade"));

        let moves = pending(&node, &market, None).unwrap();
        assert_eq!(moves.names(), vec!["take"]);
        assert!(moves.moves[0].is_complete());
        assert_eq!(moves.moves[0].args, args([("resource", "oil".into())]));
    }

    #[test]
    fn test_expanded_and_pass() {
        let market = Market { stock: vec!["oil", "wood"] };
        let node = action_node(
            ActionStep::new()
                .action_with(StepAction::new("take").expand())
                .action("trade")
                .optional("Done"),
        );

        let moves = pending(&node, &market, None).unwrap();
        assert_eq!(moves.names(), vec!["take", PASS]);
        assert!(moves.find(PASS).unwrap().is_complete());
    }

    #[test]
    fn test_prefill_narrows_moves() {
        let market = Market { stock: vec!["oil", "wood"] };
        let node = action_node(
            ActionStep::new().action_with(StepAction::new("take").prefill(args([("resource", "wood".into())]))),
        );

        let moves = pending(&node, &market, None).unwrap();
        assert!(moves.moves[0].is_complete());
        assert_eq!(moves.moves[0].args.get("resource"), Some(&Argument::from("wood")));
    }

    #[test]
    fn test_partial_args_stay_with_their_action() {
        let market = Market { stock: vec!["oil", "wood"] };
        let partial = args([("resource", "wood".into())]);

        // Two actions on offer and no name: the partial args belong to neither
        let node = action_node(ActionStep::new().action("take").action("trade"));
        let moves = pending_from(&node, &market, None, Some(&partial)).unwrap();
        assert_eq!(moves.names(), vec!["take"]);
        assert!(moves.moves[0].args.is_empty());
        assert_eq!(moves.moves[0].selections[0].name, "resource");

        let named = pending_from(&node, &market, Some("take"), Some(&partial)).unwrap();
        assert!(named.moves[0].is_complete());
        assert_eq!(named.moves[0].args, partial);

        // A single action on offer takes them without a name
        let single = action_node(ActionStep::new().action("take"));
        let moves = pending_from(&single, &market, None, Some(&partial)).unwrap();
        assert!(moves.moves[0].is_complete());
        assert_eq!(moves.moves[0].args, partial);
    }

    #[test]
    fn test_nothing_playable() {
        let market = Market { stock: vec![] };
        let node = action_node(ActionStep::new().action("take").action("trade"));
        assert!(pending(&node, &market, None).is_none());

        let branch = reset(&node, &market, &Scope::default());
        let located = awaiting_steps(&node, &branch, &Scope::default());
        assert!(!is_playable(&table(), &market, &located[0], PlayerId::new(0)));
    }
}

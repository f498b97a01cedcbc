//! Flow definitions.
//!
//! A flow is an immutable tree of [`FlowNode`]s built once, before play,
//! from the builder functions in this module. Nodes hold author callbacks;
//! the running position lives separately in a [`Branch`](super::Branch).
//!
//! ## Example
//!
//! ```
//! use turnflow::core::{Args, Game};
//! use turnflow::flow::{sequence, step, while_loop, FlowNode, StepContext};
//!
//! struct Counter { count: i64 }
//! impl Game for Counter {
//!     fn player_count(&self) -> usize { 1 }
//! }
//!
//! let main: FlowNode<Counter> = sequence(vec![
//!     while_loop(
//!         |game: &Counter, _: &Args| game.count < 13,
//!         vec![step(|ctx: &mut StepContext<'_, Counter>| ctx.game.count += 1)],
//!     )
//!     .named("counting")
//!     .into(),
//! ]);
//! assert_eq!(main.name(), None);
//! ```

use std::sync::Arc;

use crate::core::{Argument, Args, Game, GameRng, PlayerId};

use super::action_step::ActionStep;
use super::signal::Control;

/// Flow step callback.
pub type StepFn<G> = Arc<dyn Fn(&mut StepContext<'_, G>) -> Control + Send + Sync>;

/// Predicate over the game and the argument context.
pub type Predicate<G> = Arc<dyn Fn(&G, &Args) -> bool + Send + Sync>;

/// Value computed from the game and the argument context.
pub type ValueFn<G> = Arc<dyn Fn(&G, &Args) -> Argument + Send + Sync>;

/// Collection computed from the game and the argument context.
pub type CollectionFn<G> = Arc<dyn Fn(&G, &Args) -> Vec<Argument> + Send + Sync>;

/// Player list computed from the game and the argument context.
pub type PlayersFn<G> = Arc<dyn Fn(&G, &Args) -> Vec<PlayerId> + Send + Sync>;

/// Loop value step function.
pub type NextFn = Arc<dyn Fn(&Argument) -> Argument + Send + Sync>;

/// Loop value test.
pub type TestFn = Arc<dyn Fn(&Argument) -> bool + Send + Sync>;

/// Ordered list of steps.
pub type Block<G> = Vec<FlowStep<G>>;

/// Everything a flow step callback may touch.
pub struct StepContext<'a, G> {
    /// The host game.
    pub game: &'a mut G,
    /// Argument context: entry args plus values of enclosing named nodes.
    pub args: &'a Args,
    /// Player of the enclosing per-player node, if any.
    pub player: Option<PlayerId>,
    /// Game RNG.
    pub rng: &'a mut GameRng,
}

impl<G> StepContext<'_, G> {
    /// Look up an argument by name.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }
}

/// One entry in a block.
pub enum FlowStep<G> {
    /// Plain callback; runs to completion in one interpreter step.
    Call(StepFn<G>),
    /// Nested node.
    Node(FlowNode<G>),
}

impl<G> From<FlowNode<G>> for FlowStep<G> {
    fn from(node: FlowNode<G>) -> Self {
        FlowStep::Node(node)
    }
}

impl<G> std::fmt::Debug for FlowStep<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowStep::Call(_) => f.write_str("Call"),
            FlowStep::Node(node) => node.fmt(f),
        }
    }
}

/// Case matcher for a switch.
#[derive(Clone)]
pub enum CaseMatch {
    Eq(Argument),
    When(TestFn),
    Default,
}

/// One case of a switch node.
pub struct Case<G> {
    pub(crate) matcher: CaseMatch,
    pub(crate) block: Block<G>,
}

impl<G> Case<G> {
    /// Run `block` when the switch value equals `value`.
    pub fn eq(value: impl Into<Argument>, block: Block<G>) -> Self {
        Self {
            matcher: CaseMatch::Eq(value.into()),
            block,
        }
    }

    /// Run `block` when `test` accepts the switch value.
    pub fn when<F>(test: F, block: Block<G>) -> Self
    where
        F: Fn(&Argument) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher: CaseMatch::When(Arc::new(test)),
            block,
        }
    }

    /// Run `block` when no other case matches.
    pub fn default(block: Block<G>) -> Self {
        Self {
            matcher: CaseMatch::Default,
            block,
        }
    }

    pub(crate) fn matches(&self, value: &Argument) -> bool {
        match &self.matcher {
            CaseMatch::Eq(expected) => expected == value,
            CaseMatch::When(test) => test(value),
            CaseMatch::Default => false,
        }
    }
}

/// Node kinds.
pub enum NodeSpec<G> {
    Sequence(Block<G>),
    /// `condition` of `None` loops until broken.
    While {
        condition: Option<Predicate<G>>,
        body: Block<G>,
    },
    For {
        initial: ValueFn<G>,
        next: NextFn,
        test: TestFn,
        body: Block<G>,
    },
    ForEach {
        collection: CollectionFn<G>,
        /// Each value is a player who becomes the active player.
        sets_player: bool,
        body: Block<G>,
    },
    Switch {
        value: ValueFn<G>,
        cases: Vec<Case<G>>,
        default: Option<Block<G>>,
    },
    Action(ActionStep<G>),
    /// `players` of `None` means every seated player.
    Parallel {
        players: Option<PlayersFn<G>>,
        body: Box<FlowNode<G>>,
    },
}

/// A node of a flow definition.
pub struct FlowNode<G> {
    pub(crate) name: Option<String>,
    pub(crate) spec: NodeSpec<G>,
}

impl<G> FlowNode<G> {
    pub fn new(spec: NodeSpec<G>) -> Self {
        Self { name: None, spec }
    }

    /// Name this node. Named nodes add their value to the argument context
    /// of everything beneath them.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn spec(&self) -> &NodeSpec<G> {
        &self.spec
    }

    /// Is this a loop kind that consumes interrupts?
    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(
            self.spec,
            NodeSpec::While { .. } | NodeSpec::For { .. } | NodeSpec::ForEach { .. }
        )
    }

    /// Label used in errors and logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(match self.spec {
            NodeSpec::Sequence(_) => "<sequence>",
            NodeSpec::While { .. } | NodeSpec::For { .. } => "<loop>",
            NodeSpec::ForEach { .. } => "<foreach>",
            NodeSpec::Switch { .. } => "<switch>",
            NodeSpec::Action(_) => "<action step>",
            NodeSpec::Parallel { .. } => "<parallel>",
        })
    }

    /// Visit this node and every node beneath it, depth first.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a FlowNode<G>)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Nodes declared directly beneath this one, in declaration order.
    #[must_use]
    pub fn children(&self) -> Vec<&FlowNode<G>> {
        fn nodes<G>(block: &Block<G>) -> impl Iterator<Item = &FlowNode<G>> {
            block.iter().filter_map(|step| match step {
                FlowStep::Node(node) => Some(node),
                FlowStep::Call(_) => None,
            })
        }

        match &self.spec {
            NodeSpec::Sequence(block)
            | NodeSpec::While { body: block, .. }
            | NodeSpec::For { body: block, .. }
            | NodeSpec::ForEach { body: block, .. } => nodes(block).collect(),
            NodeSpec::Switch { cases, default, .. } => cases
                .iter()
                .map(|case| &case.block)
                .chain(default.iter())
                .flat_map(nodes)
                .collect(),
            NodeSpec::Action(step) => step.choices().iter().flat_map(|c| nodes(&c.then)).collect(),
            NodeSpec::Parallel { body, .. } => vec![body.as_ref()],
        }
    }
}

impl<G> std::fmt::Debug for FlowNode<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowNode")
            .field("name", &self.name)
            .field("kind", &self.label())
            .finish()
    }
}

/// Plain step callback.
pub fn step<G, F>(f: F) -> FlowStep<G>
where
    F: Fn(&mut StepContext<'_, G>) + Send + Sync + 'static,
{
    step_with(move |ctx: &mut StepContext<'_, G>| {
        f(ctx);
        Control::Proceed
    })
}

/// Step callback that may interrupt the enclosing loop or enter a subflow.
pub fn step_with<G, F>(f: F) -> FlowStep<G>
where
    F: Fn(&mut StepContext<'_, G>) -> Control + Send + Sync + 'static,
{
    FlowStep::Call(Arc::new(f))
}

/// Run steps in order.
pub fn sequence<G>(block: Block<G>) -> FlowNode<G> {
    FlowNode::new(NodeSpec::Sequence(block))
}

/// Run `body` while `condition` holds, checked before each iteration.
pub fn while_loop<G, F>(condition: F, body: Block<G>) -> FlowNode<G>
where
    F: Fn(&G, &Args) -> bool + Send + Sync + 'static,
{
    FlowNode::new(NodeSpec::While {
        condition: Some(Arc::new(condition)),
        body,
    })
}

/// Run `body` until a step breaks out.
pub fn forever<G>(body: Block<G>) -> FlowNode<G> {
    FlowNode::new(NodeSpec::While { condition: None, body })
}

/// Counted loop: start at `initial`, step with `next`, run while `test`
/// accepts the value.
pub fn for_loop<G, I, N, T>(initial: I, next: N, test: T, body: Block<G>) -> FlowNode<G>
where
    I: Fn(&G, &Args) -> Argument + Send + Sync + 'static,
    N: Fn(&Argument) -> Argument + Send + Sync + 'static,
    T: Fn(&Argument) -> bool + Send + Sync + 'static,
{
    FlowNode::new(NodeSpec::For {
        initial: Arc::new(initial),
        next: Arc::new(next),
        test: Arc::new(test),
        body,
    })
}

/// Counted loop over an integer range.
pub fn for_range<G>(range: std::ops::Range<i64>, body: Block<G>) -> FlowNode<G> {
    let end = range.end;
    for_loop(
        move |_: &G, _: &Args| Argument::Number(range.start),
        |value: &Argument| Argument::Number(value.as_number().unwrap_or(0) + 1),
        move |value: &Argument| value.as_number().is_some_and(|n| n < end),
        body,
    )
}

/// Run `body` once per item. The collection is captured on entry.
pub fn for_each<G, F>(collection: F, body: Block<G>) -> FlowNode<G>
where
    F: Fn(&G, &Args) -> Vec<Argument> + Send + Sync + 'static,
{
    FlowNode::new(NodeSpec::ForEach {
        collection: Arc::new(collection),
        sets_player: false,
        body,
    })
}

/// Run `body` once per seated player, in seat order, with that player active.
pub fn each_player<G: Game>(body: Block<G>) -> FlowNode<G> {
    FlowNode::new(NodeSpec::ForEach {
        collection: Arc::new(|game: &G, _: &Args| {
            PlayerId::all(game.player_count()).map(Argument::from).collect()
        }),
        sets_player: true,
        body,
    })
}

/// Evaluate `value` once and run the first matching case.
///
/// # Panics
///
/// Panics if more than one default case is given.
pub fn switch_case<G, F>(value: F, cases: Vec<Case<G>>) -> FlowNode<G>
where
    F: Fn(&G, &Args) -> Argument + Send + Sync + 'static,
{
    let mut default = None;
    let mut matched = Vec::with_capacity(cases.len());
    for case in cases {
        if matches!(case.matcher, CaseMatch::Default) {
            assert!(default.is_none(), "switch declares more than one default case");
            default = Some(case.block);
        } else {
            matched.push(case);
        }
    }
    FlowNode::new(NodeSpec::Switch {
        value: Arc::new(value),
        cases: matched,
        default,
    })
}

/// Two-way branch.
pub fn if_else<G, F>(condition: F, then: Block<G>, otherwise: Block<G>) -> FlowNode<G>
where
    F: Fn(&G, &Args) -> bool + Send + Sync + 'static,
{
    let mut cases = vec![Case::eq(true, then)];
    if !otherwise.is_empty() {
        cases.push(Case::default(otherwise));
    }
    switch_case(move |game: &G, args: &Args| Argument::Bool(condition(game, args)), cases)
}

/// Suspend until a player takes one of the offered actions.
pub fn actions<G>(step: ActionStep<G>) -> FlowNode<G> {
    FlowNode::new(NodeSpec::Action(step))
}

/// Run `body` for every seated player side by side.
pub fn every_player<G>(body: Block<G>) -> FlowNode<G> {
    FlowNode::new(NodeSpec::Parallel {
        players: None,
        body: Box::new(sequence(body)),
    })
}

/// Run `body` side by side for the players `players` returns on entry.
pub fn every_player_of<G, F>(players: F, body: Block<G>) -> FlowNode<G>
where
    F: Fn(&G, &Args) -> Vec<PlayerId> + Send + Sync + 'static,
{
    FlowNode::new(NodeSpec::Parallel {
        players: Some(Arc::new(players)),
        body: Box::new(sequence(body)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Table;

    impl Game for Table {
        fn player_count(&self) -> usize {
            2
        }
    }

    type Ctx<'a> = StepContext<'a, Table>;

    #[test]
    fn test_named_and_label() {
        let node: FlowNode<Table> = sequence(vec![]);
        assert_eq!(node.label(), "<sequence>");
        let node = node.named("main");
        assert_eq!(node.name(), Some("main"));
        assert_eq!(node.label(), "main");
    }

    #[test]
    fn test_loop_kinds() {
        assert!(forever::<Table>(vec![]).is_loop());
        assert!(for_range::<Table>(0..3, vec![]).is_loop());
        assert!(each_player::<Table>(vec![]).is_loop());
        assert!(!sequence::<Table>(vec![]).is_loop());
        assert!(!every_player::<Table>(vec![]).is_loop());
    }

    #[test]
    fn test_switch_collects_default() {
        let node: FlowNode<Table> = switch_case(
            |_: &Table, _: &Args| Argument::Number(1),
            vec![
                Case::eq(0, vec![]),
                Case::default(vec![step(|_: &mut Ctx<'_>| {})]),
                Case::when(|v: &Argument| v.as_number() == Some(1), vec![]),
            ],
        );
        let NodeSpec::Switch { cases, default, .. } = node.spec() else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(default.as_ref().map(Vec::len), Some(1));
        assert!(cases[1].matches(&Argument::Number(1)));
        assert!(!cases[0].matches(&Argument::Number(1)));
    }

    #[test]
    #[should_panic(expected = "more than one default")]
    fn test_switch_rejects_two_defaults() {
        let _: FlowNode<Table> = switch_case(
            |_: &Table, _: &Args| Argument::Number(1),
            vec![Case::default(vec![]), Case::default(vec![])],
        );
    }

    #[test]
    fn test_if_else_without_else() {
        let node: FlowNode<Table> = if_else(|_: &Table, _: &Args| true, vec![], vec![]);
        let NodeSpec::Switch { cases, default, .. } = node.spec() else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 1);
        assert!(default.is_none());
    }

    #[test]
    fn test_visit_reaches_nested_nodes() {
        let node: FlowNode<Table> = sequence(vec![
            forever(vec![sequence(vec![]).named("inner").into()]).named("outer").into(),
            every_player(vec![sequence(vec![]).named("each").into()]).into(),
        ])
        .named("main");

        let mut names = Vec::new();
        node.visit(&mut |n| names.extend(n.name()));
        assert_eq!(names, vec!["main", "outer", "inner", "each"]);
    }
}

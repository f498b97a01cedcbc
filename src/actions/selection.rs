//! Selection declarations.
//!
//! A [`Selection`] is one choice a player makes while building a move. Its
//! bounds may be literal or computed from the game and the arguments
//! committed so far; [`Selection::resolve`] evaluates them into a
//! [`ResolvedSelection`].
//!
//! ## Kinds
//!
//! | Builder | Value |
//! |---|---|
//! | [`Selection::board`] | an element, or a list of elements with `min`/`max`/`count` |
//! | [`Selection::choices`] | one entry of a list |
//! | [`Selection::number`] | an integer in `min..=max` (min defaults to 1) |
//! | [`Selection::text`] | free text, optionally matching a pattern |
//! | [`Selection::button`] | a single fixed value |
//! | [`Selection::place`] | a `[column, row]` position for a piece |

use std::sync::Arc;


use crate::core::{Argument, Args};

use super::resolved::{Choice, ResolvedKind, ResolvedSelection, SkipIf, TextPattern};

/// A field that is either fixed or computed per resolution.
pub enum Dynamic<G, T> {
    Fixed(T),
    Computed(Arc<dyn Fn(&G, &Args) -> T + Send + Sync>),
}

impl<G, T: Clone> Dynamic<G, T> {
    pub fn resolve(&self, game: &G, args: &Args) -> T {
        match self {
            Dynamic::Fixed(value) => value.clone(),
            Dynamic::Computed(f) => f(game, args),
        }
    }
}

/// Custom validator. Sees the arguments including the value under test.
pub type Validator<G> = Arc<dyn Fn(&G, &Args) -> Option<String> + Send + Sync>;

enum SelectionKind<G> {
    Board(Dynamic<G, Vec<Argument>>),
    Choices(Dynamic<G, Vec<Choice>>),
    Number,
    Text {
        pattern: Option<TextPattern>,
        initial: Option<String>,
    },
    Button(Argument),
    Place {
        piece: Argument,
        area: Option<(i64, i64)>,
    },
}

/// One declared choice of an action.
pub struct Selection<G> {
    name: String,
    prompt: Option<Dynamic<G, String>>,
    kind: SelectionKind<G>,
    count: Option<Dynamic<G, i64>>,
    min: Option<Dynamic<G, i64>>,
    max: Option<Dynamic<G, i64>>,
    skip_if: SkipIf,
    confirm: Option<String>,
    validate: Option<Validator<G>>,
}

impl<G> Selection<G> {
    fn with_kind(name: impl Into<String>, kind: SelectionKind<G>) -> Self {
        Self {
            name: name.into(),
            prompt: None,
            kind,
            count: None,
            min: None,
            max: None,
            skip_if: SkipIf::default(),
            confirm: None,
            validate: None,
        }
    }

    /// Pick from board elements computed on each resolution.
    pub fn board<F>(name: impl Into<String>, choices: F) -> Self
    where
        F: Fn(&G, &Args) -> Vec<Argument> + Send + Sync + 'static,
    {
        Self::with_kind(name, SelectionKind::Board(Dynamic::Computed(Arc::new(choices))))
    }

    /// Pick one entry from a fixed list.
    pub fn choices<C: Into<Choice>>(name: impl Into<String>, choices: Vec<C>) -> Self {
        let choices = choices.into_iter().map(Into::into).collect();
        Self::with_kind(name, SelectionKind::Choices(Dynamic::Fixed(choices)))
    }

    /// Pick one entry from a list computed on each resolution.
    pub fn choices_with<F>(name: impl Into<String>, choices: F) -> Self
    where
        F: Fn(&G, &Args) -> Vec<Choice> + Send + Sync + 'static,
    {
        Self::with_kind(name, SelectionKind::Choices(Dynamic::Computed(Arc::new(choices))))
    }

    /// Pick an integer.
    pub fn number(name: impl Into<String>) -> Self {
        Self::with_kind(name, SelectionKind::Number)
    }

    /// Enter free text.
    pub fn text(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            SelectionKind::Text {
                pattern: None,
                initial: None,
            },
        )
    }

    /// Confirm with a single button.
    pub fn button(name: impl Into<String>, value: impl Into<Argument>) -> Self {
        Self::with_kind(name, SelectionKind::Button(value.into()))
    }

    /// Place `piece` somewhere on a grid.
    pub fn place(name: impl Into<String>, piece: impl Into<Argument>) -> Self {
        Self::with_kind(
            name,
            SelectionKind::Place {
                piece: piece.into(),
                area: None,
            },
        )
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(Dynamic::Fixed(prompt.into()));
        self
    }

    #[must_use]
    pub fn prompt_with<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&G, &Args) -> String + Send + Sync + 'static,
    {
        self.prompt = Some(Dynamic::Computed(Arc::new(prompt)));
        self
    }

    /// Lower bound: smallest number, or fewest board elements.
    #[must_use]
    pub fn min(mut self, min: i64) -> Self {
        self.require_bounds("min");
        self.min = Some(Dynamic::Fixed(min));
        self
    }

    #[must_use]
    pub fn min_with<F>(mut self, min: F) -> Self
    where
        F: Fn(&G, &Args) -> i64 + Send + Sync + 'static,
    {
        self.require_bounds("min");
        self.min = Some(Dynamic::Computed(Arc::new(min)));
        self
    }

    /// Upper bound: largest number, or most board elements.
    #[must_use]
    pub fn max(mut self, max: i64) -> Self {
        self.require_bounds("max");
        self.max = Some(Dynamic::Fixed(max));
        self
    }

    #[must_use]
    pub fn max_with<F>(mut self, max: F) -> Self
    where
        F: Fn(&G, &Args) -> i64 + Send + Sync + 'static,
    {
        self.require_bounds("max");
        self.max = Some(Dynamic::Computed(Arc::new(max)));
        self
    }

    /// Pick exactly `count` board elements. Takes precedence over min/max.
    #[must_use]
    pub fn count(mut self, count: i64) -> Self {
        self.require_board("count");
        self.count = Some(Dynamic::Fixed(count));
        self
    }

    #[must_use]
    pub fn count_with<F>(mut self, count: F) -> Self
    where
        F: Fn(&G, &Args) -> i64 + Send + Sync + 'static,
    {
        self.require_board("count");
        self.count = Some(Dynamic::Computed(Arc::new(count)));
        self
    }

    /// Restrict text input to a regular expression.
    ///
    /// # Panics
    ///
    /// Panics if the selection is not text or the pattern does not compile.
    #[must_use]
    pub fn pattern(mut self, pattern: &str) -> Self {
        let compiled = TextPattern::new(pattern).unwrap_or_else(|e| panic!("invalid pattern for {}: {e}", self.name));
        match &mut self.kind {
            SelectionKind::Text { pattern, .. } => *pattern = Some(compiled),
            _ => panic!("pattern only applies to text selections ({})", self.name),
        }
        self
    }

    /// Initial text shown to the player.
    #[must_use]
    pub fn initial(mut self, text: impl Into<String>) -> Self {
        match &mut self.kind {
            SelectionKind::Text { initial, .. } => *initial = Some(text.into()),
            _ => panic!("initial only applies to text selections ({})", self.name),
        }
        self
    }

    /// Limit placement to a `columns` x `rows` grid.
    #[must_use]
    pub fn area(mut self, columns: i64, rows: i64) -> Self {
        match &mut self.kind {
            SelectionKind::Place { area, .. } => *area = Some((columns, rows)),
            _ => panic!("area only applies to placement selections ({})", self.name),
        }
        self
    }

    #[must_use]
    pub fn skip_if(mut self, skip_if: SkipIf) -> Self {
        self.skip_if = skip_if;
        self
    }

    /// Ask the player to confirm after choosing.
    #[must_use]
    pub fn confirm(mut self, text: impl Into<String>) -> Self {
        self.confirm = Some(text.into());
        self
    }

    /// Add a custom check. Return `Some(message)` to reject the value.
    #[must_use]
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&G, &Args) -> Option<String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    fn require_bounds(&self, what: &str) {
        assert!(
            matches!(self.kind, SelectionKind::Number | SelectionKind::Board(_)),
            "{what} only applies to number and board selections ({})",
            self.name
        );
    }

    fn require_board(&self, what: &str) {
        assert!(
            matches!(self.kind, SelectionKind::Board(_)),
            "{what} only applies to board selections ({})",
            self.name
        );
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate every computed field against `args`.
    pub fn resolve(&self, game: &G, args: &Args) -> ResolvedSelection {
        let bound = |field: &Option<Dynamic<G, i64>>| field.as_ref().map(|f| f.resolve(game, args));

        let kind = match &self.kind {
            SelectionKind::Board(choices) => {
                let choices = choices.resolve(game, args);
                let (min, max) = match (bound(&self.count), bound(&self.min), bound(&self.max)) {
                    (Some(count), _, _) => (Some(to_count(count)), Some(to_count(count))),
                    (None, None, None) => (None, None),
                    (None, min, max) => (
                        Some(min.map_or(1, to_count)),
                        Some(max.map_or(choices.len(), to_count)),
                    ),
                };
                ResolvedKind::Board { choices, min, max }
            }
            SelectionKind::Choices(choices) => ResolvedKind::Choices {
                choices: choices.resolve(game, args),
            },
            SelectionKind::Number => ResolvedKind::Number {
                min: bound(&self.min).unwrap_or(1),
                max: bound(&self.max),
            },
            SelectionKind::Text { pattern, initial } => ResolvedKind::Text {
                pattern: pattern.clone(),
                initial: initial.clone(),
            },
            SelectionKind::Button(value) => ResolvedKind::Button { value: value.clone() },
            SelectionKind::Place { piece, area } => ResolvedKind::Place {
                piece: piece.clone(),
                area: *area,
            },
        };

        ResolvedSelection {
            name: self.name.clone(),
            prompt: self.prompt.as_ref().map(|p| p.resolve(game, args)),
            kind,
            skip_if: self.skip_if,
            confirm: self.confirm.clone(),
        }
    }

    /// Run only the custom validator.
    pub fn custom_error(&self, game: &G, args: &Args) -> Option<String> {
        self.validate.as_ref().and_then(|validate| validate(game, args))
    }

    /// Check the committed value for this selection in `args`.
    pub fn error(&self, game: &G, args: &Args) -> Option<String> {
        let Some(value) = args.get(&self.name) else {
            return Some(format!("{} is required", self.name));
        };
        self.resolve(game, args)
            .error(value)
            .or_else(|| self.custom_error(game, args))
    }
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

//! Resolved selections.
//!
//! A [`ResolvedSelection`] is a selection with every computed field
//! evaluated against one partial argument set. It is a plain value: it can
//! be compared, serialized to clients, and asked what values it accepts.
//!
//! ## Bounded vs Unbounded
//!
//! The pending-move search can only look ahead through selections whose
//! legal values can be listed. Lists, single board picks, small number
//! ranges and small combination sets are bounded. Text, buttons,
//! placements, wide number ranges and huge combination sets are not; the
//! search stops at them and asks the player.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::core::Argument;

/// Number ranges wider than this are treated as unbounded.
pub const MAX_ENUMERATED_NUMBERS: i64 = 100;

/// Multi-select board choices with more combinations than this are treated
/// as unbounded.
pub const MAX_ENUMERATED_COMBINATIONS: usize = 1_000;

/// A compiled text pattern.
///
/// Compiled once where the selection is declared and shared by every
/// resolution of it. Serializes as the pattern source.
#[derive(Clone)]
pub struct TextPattern(Arc<Regex>);

impl TextPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(|re| Self(Arc::new(re)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextPattern").field(&self.as_str()).finish()
    }
}

impl Serialize for TextPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TextPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(&source).map_err(serde::de::Error::custom)
    }
}

/// When a selection may be skipped and auto-filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipIf {
    /// Always present the selection, even if only one value is legal.
    Never,
    /// Skip when exactly one value is legal.
    #[default]
    OnlyOne,
    /// Skip whenever a value can be picked without the player.
    Always,
}

/// One entry in a list selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Choice {
    pub value: Argument,
    pub label: String,
}

impl Choice {
    /// Create a choice with an explicit label.
    pub fn new(value: impl Into<Argument>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Self::new(value, value)
    }
}

impl From<Argument> for Choice {
    fn from(value: Argument) -> Self {
        let label = value.to_string();
        Self { value, label }
    }
}

/// Kind-specific resolved bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResolvedKind {
    /// Pick element(s) on the board. `min`/`max` are set only for
    /// multi-select, in which case the value is a list.
    Board {
        #[serde(rename = "boardChoices")]
        choices: Vec<Argument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    /// Pick one entry from a list.
    Choices { choices: Vec<Choice> },
    /// Pick an integer. `max` of `None` is unbounded.
    Number {
        min: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Free text, optionally constrained by a pattern.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<TextPattern>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial: Option<String>,
    },
    /// A single fixed value, shown as a button.
    Button { value: Argument },
    /// Place a piece at a `[column, row]` position.
    Place {
        piece: Argument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        area: Option<(i64, i64)>,
    },
}

/// A selection with every computed field evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub kind: ResolvedKind,
    #[serde(rename = "skipIf", default)]
    pub skip_if: SkipIf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl ResolvedSelection {
    /// Is this a multi-select board choice?
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(
            self.kind,
            ResolvedKind::Board { min: Some(_), .. } | ResolvedKind::Board { max: Some(_), .. }
        )
    }

    /// Is this a board selection (answered by clicking the board)?
    #[must_use]
    pub fn is_board(&self) -> bool {
        matches!(self.kind, ResolvedKind::Board { .. })
    }

    /// The single legal value when the selection offers no real choice.
    #[must_use]
    pub fn is_forced(&self) -> Option<Argument> {
        match &self.kind {
            ResolvedKind::Button { value } => Some(value.clone()),
            ResolvedKind::Board { choices, .. } if !self.is_multi() && choices.len() == 1 => {
                Some(choices[0].clone())
            }
            ResolvedKind::Choices { choices } if choices.len() == 1 => Some(choices[0].value.clone()),
            ResolvedKind::Choices { choices } if self.skip_if == SkipIf::Always => {
                choices.first().map(|c| c.value.clone())
            }
            ResolvedKind::Number { min, max: Some(max) } if min == max => Some(Argument::Number(*min)),
            _ => None,
        }
    }

    /// The value to auto-fill if this selection should be skipped.
    #[must_use]
    pub fn skipped_value(&self) -> Option<Argument> {
        match self.skip_if {
            SkipIf::Never => None,
            SkipIf::OnlyOne | SkipIf::Always => self.is_forced(),
        }
    }

    /// False when no value could ever satisfy this selection.
    #[must_use]
    pub fn is_possible(&self) -> bool {
        match &self.kind {
            ResolvedKind::Choices { choices } => !choices.is_empty(),
            ResolvedKind::Board { choices, min, max } => match (min, max) {
                (Some(min), Some(max)) => min <= max && choices.len() >= *min,
                _ => !choices.is_empty(),
            },
            ResolvedKind::Number { min, max } => max.map_or(true, |max| *min <= max),
            ResolvedKind::Text { .. } | ResolvedKind::Button { .. } | ResolvedKind::Place { .. } => true,
        }
    }

    /// Can [`options`](Self::options) list every legal value?
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        match &self.kind {
            ResolvedKind::Choices { .. } => true,
            ResolvedKind::Board { choices, min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    combination_count(choices.len(), *min, *max) <= MAX_ENUMERATED_COMBINATIONS
                }
                _ => true,
            },
            ResolvedKind::Number { min, max } => {
                max.is_some_and(|max| max.saturating_sub(*min) < MAX_ENUMERATED_NUMBERS)
            }
            ResolvedKind::Text { .. } | ResolvedKind::Button { .. } | ResolvedKind::Place { .. } => false,
        }
    }

    /// Every legal value, for bounded selections. Empty when unbounded.
    ///
    /// Multi-select board values are generated in ascending size, then
    /// lexicographic order of choice position.
    #[must_use]
    pub fn options(&self) -> Vec<Argument> {
        if !self.is_bounded() || !self.is_possible() {
            return Vec::new();
        }
        match &self.kind {
            ResolvedKind::Choices { choices } => choices.iter().map(|c| c.value.clone()).collect(),
            ResolvedKind::Board { choices, min: Some(min), max: Some(max) } => {
                let max = (*max).min(choices.len());
                (*min..=max)
                    .flat_map(|size| combinations(choices.len(), size))
                    .map(|indices| {
                        Argument::List(indices.iter().map(|&i| choices[i].clone()).collect())
                    })
                    .collect()
            }
            ResolvedKind::Board { choices, .. } => choices.clone(),
            ResolvedKind::Number { min, max: Some(max) } => (*min..=*max).map(Argument::Number).collect(),
            _ => Vec::new(),
        }
    }

    /// Check a committed value against the resolved bounds.
    ///
    /// Returns `None` when the value is acceptable.
    #[must_use]
    pub fn error(&self, value: &Argument) -> Option<String> {
        let name = &self.name;
        match &self.kind {
            ResolvedKind::Choices { choices } => {
                if choices.iter().any(|c| &c.value == value) {
                    None
                } else {
                    Some(format!("'{value}' is not a valid choice for {name}"))
                }
            }
            ResolvedKind::Board { choices, min: None, max: None } => {
                if choices.contains(value) {
                    None
                } else {
                    Some(format!("{value} cannot be selected for {name}"))
                }
            }
            ResolvedKind::Board { choices, min, max } => {
                let Some(items) = value.as_list() else {
                    return Some(format!("{name} expects a list of selections"));
                };
                let min = min.unwrap_or(1);
                let max = max.unwrap_or(choices.len());
                if items.len() < min || items.len() > max {
                    return Some(format!("select between {min} and {max} for {name}"));
                }
                if let Some(bad) = items.iter().find(|item| !choices.contains(item)) {
                    return Some(format!("{bad} cannot be selected for {name}"));
                }
                if items.iter().enumerate().any(|(i, item)| items[..i].contains(item)) {
                    return Some(format!("{name} contains a duplicate selection"));
                }
                None
            }
            ResolvedKind::Number { min, max } => {
                let Some(n) = value.as_number() else {
                    return Some(format!("{name} must be a number"));
                };
                if n < *min {
                    Some(format!("{name} must be at least {min}"))
                } else if let Some(max) = max.filter(|max| n > *max) {
                    Some(format!("{name} must be at most {max}"))
                } else {
                    None
                }
            }
            ResolvedKind::Text { pattern, .. } => {
                let Some(text) = value.as_text() else {
                    return Some(format!("{name} must be text"));
                };
                pattern
                    .as_ref()
                    .filter(|pattern| !pattern.is_match(text))
                    .map(|_| format!("'{text}' is not a valid {name}"))
            }
            ResolvedKind::Button { value: expected } => {
                (expected != value).then(|| format!("'{value}' is not a valid choice for {name}"))
            }
            ResolvedKind::Place { area, .. } => {
                let coords: Option<SmallVec<[i64; 2]>> = value
                    .as_list()
                    .map(|items| items.iter().filter_map(Argument::as_number).collect());
                match coords.as_deref() {
                    Some([col, row]) => match area {
                        Some((cols, rows)) if *col < 0 || *row < 0 || col >= cols || row >= rows => {
                            Some(format!("{name} is outside the placement area"))
                        }
                        _ => None,
                    },
                    _ => Some(format!("{name} must be a [column, row] position")),
                }
            }
        }
    }

    /// Narrow the legal values to those the search proved viable.
    pub(crate) fn restrict_to(&mut self, viable: &[Argument]) {
        match &mut self.kind {
            ResolvedKind::Choices { choices } => choices.retain(|c| viable.contains(&c.value)),
            ResolvedKind::Board { choices, min: None, max: None } => {
                choices.retain(|c| viable.contains(c));
            }
            ResolvedKind::Board { choices, .. } => {
                choices.retain(|c| {
                    viable
                        .iter()
                        .filter_map(Argument::as_list)
                        .any(|combo| combo.contains(c))
                });
            }
            ResolvedKind::Number { min, max } => {
                let numbers = viable.iter().filter_map(Argument::as_number);
                if let (Some(lo), Some(hi)) = (numbers.clone().min(), numbers.max()) {
                    *min = lo;
                    *max = Some(hi);
                }
            }
            _ => {}
        }
    }
}

/// Total number of index subsets of size `min..=max` drawn from `n`.
fn combination_count(n: usize, min: usize, max: usize) -> usize {
    (min..=max.min(n)).fold(0usize, |total, k| total.saturating_add(binomial(n, k)))
}

fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n - k);
    (0..k).fold(1usize, |acc, i| acc.saturating_mul(n - i) / (i + 1))
}

/// Index subsets of size `k` from `0..n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<SmallVec<[usize; 4]>> {
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current: SmallVec<[usize; 4]> = (0..k).collect();
    loop {
        out.push(current.clone());
        // rightmost index that can still move right
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return out;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ElementRef;

    fn resolved(kind: ResolvedKind) -> ResolvedSelection {
        ResolvedSelection {
            name: "pick".into(),
            prompt: None,
            kind,
            skip_if: SkipIf::OnlyOne,
            confirm: None,
        }
    }

    fn el(id: u32) -> Argument {
        Argument::Element(ElementRef::new(id))
    }

    #[test]
    fn test_combinations_order() {
        let combos: Vec<Vec<usize>> = combinations(4, 2).into_iter().map(|c| c.to_vec()).collect();
        assert_eq!(
            combos,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(combinations(3, 0).len(), 1);
        assert!(combinations(2, 3).is_empty());
    }

    #[test]
    fn test_combination_count() {
        assert_eq!(combination_count(4, 1, 2), 4 + 6);
        assert_eq!(combination_count(3, 0, 5), 8);
    }

    #[test]
    fn test_button_always_forced() {
        let sel = resolved(ResolvedKind::Button { value: "go".into() });
        assert_eq!(sel.is_forced(), Some("go".into()));
        assert!(!sel.is_bounded());
        assert!(sel.options().is_empty());
    }

    #[test]
    fn test_number_forced_when_min_equals_max() {
        let sel = resolved(ResolvedKind::Number { min: 3, max: Some(3) });
        assert_eq!(sel.is_forced(), Some(Argument::Number(3)));

        let sel = resolved(ResolvedKind::Number { min: 1, max: Some(3) });
        assert_eq!(sel.is_forced(), None);
        assert_eq!(sel.options(), vec![1.into(), 2.into(), 3.into()]);
    }

    #[test]
    fn test_number_impossible_and_unbounded() {
        assert!(!resolved(ResolvedKind::Number { min: 4, max: Some(3) }).is_possible());

        let open = resolved(ResolvedKind::Number { min: 1, max: None });
        assert!(open.is_possible());
        assert!(!open.is_bounded());
        assert!(open.options().is_empty());

        let wide = resolved(ResolvedKind::Number { min: 0, max: Some(1_000) });
        assert!(!wide.is_bounded());
    }

    #[test]
    fn test_number_errors() {
        let sel = resolved(ResolvedKind::Number { min: 1, max: Some(2) });
        assert_eq!(sel.error(&2.into()), None);
        assert_eq!(sel.error(&0.into()).as_deref(), Some("pick must be at least 1"));
        assert_eq!(sel.error(&5.into()).as_deref(), Some("pick must be at most 2"));
        assert_eq!(sel.error(&"x".into()).as_deref(), Some("pick must be a number"));
    }

    #[test]
    fn test_choices() {
        let sel = resolved(ResolvedKind::Choices {
            choices: vec!["oil".into(), "wheat".into()],
        });
        assert!(sel.is_possible());
        assert_eq!(sel.is_forced(), None);
        assert_eq!(sel.error(&"oil".into()), None);
        assert!(sel.error(&"gold".into()).is_some());

        let single = resolved(ResolvedKind::Choices { choices: vec!["oil".into()] });
        assert_eq!(single.is_forced(), Some("oil".into()));

        let empty = resolved(ResolvedKind::Choices { choices: vec![] });
        assert!(!empty.is_possible());
    }

    #[test]
    fn test_always_skip_picks_first_choice() {
        let mut sel = resolved(ResolvedKind::Choices {
            choices: vec!["a".into(), "b".into()],
        });
        sel.skip_if = SkipIf::Always;
        assert_eq!(sel.skipped_value(), Some("a".into()));

        sel.skip_if = SkipIf::Never;
        assert_eq!(sel.skipped_value(), None);
    }

    #[test]
    fn test_board_single() {
        let sel = resolved(ResolvedKind::Board {
            choices: vec![el(1)],
            min: None,
            max: None,
        });
        assert!(!sel.is_multi());
        assert_eq!(sel.is_forced(), Some(el(1)));
        assert_eq!(sel.error(&el(2)).as_deref(), Some("#2 cannot be selected for pick"));
    }

    #[test]
    fn test_board_multi_options() {
        let sel = resolved(ResolvedKind::Board {
            choices: vec![el(1), el(2), el(3)],
            min: Some(1),
            max: Some(2),
        });
        assert!(sel.is_multi());
        assert_eq!(sel.is_forced(), None);

        let options = sel.options();
        assert_eq!(options.len(), 3 + 3);
        assert_eq!(options[0], Argument::List(vec![el(1)]));
        assert_eq!(options[3], Argument::List(vec![el(1), el(2)]));
        assert_eq!(options[5], Argument::List(vec![el(2), el(3)]));
    }

    #[test]
    fn test_board_multi_below_minimum() {
        let sel = resolved(ResolvedKind::Board {
            choices: vec![el(1)],
            min: Some(2),
            max: Some(3),
        });
        assert!(!sel.is_possible());
        assert!(sel.options().is_empty());
    }

    #[test]
    fn test_board_multi_errors() {
        let sel = resolved(ResolvedKind::Board {
            choices: vec![el(1), el(2), el(3)],
            min: Some(2),
            max: Some(2),
        });
        assert_eq!(sel.error(&vec![el(1), el(3)].into()), None);
        assert!(sel.error(&vec![el(1)].into()).is_some());
        assert!(sel.error(&vec![el(1), el(1)].into()).is_some());
        assert!(sel.error(&vec![el(1), el(9)].into()).is_some());
        assert!(sel.error(&el(1)).is_some());
    }

    #[test]
    fn test_text_pattern() {
        let sel = resolved(ResolvedKind::Text {
            pattern: Some(TextPattern::new("^[a-z]+$").unwrap()),
            initial: None,
        });
        assert_eq!(sel.error(&"abc".into()), None);
        assert!(sel.error(&"ABC".into()).is_some());
        assert!(sel.error(&3.into()).is_some());
        assert!(!sel.is_bounded());
    }

    #[test]
    fn test_text_pattern_json() {
        let sel = resolved(ResolvedKind::Text {
            pattern: Some(TextPattern::new("^[0-9]{3}$").unwrap()),
            initial: None,
        });
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["pattern"], "^[0-9]{3}$");

        let back: ResolvedSelection = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, sel);
        assert_eq!(back.error(&"042".into()), None);

        let mut broken = json;
        broken["pattern"] = "(".into();
        assert!(serde_json::from_value::<ResolvedSelection>(broken).is_err());
    }

    #[test]
    fn test_place_bounds() {
        let sel = resolved(ResolvedKind::Place {
            piece: el(4),
            area: Some((3, 3)),
        });
        assert_eq!(sel.error(&vec![0, 2].into()), None);
        assert!(sel.error(&vec![3, 0].into()).is_some());
        assert!(sel.error(&vec![1].into()).is_some());
        assert!(sel.error(&"a1".into()).is_some());
    }

    #[test]
    fn test_restrict_to() {
        let mut sel = resolved(ResolvedKind::Choices {
            choices: vec!["a".into(), "b".into(), "c".into()],
        });
        sel.restrict_to(&["a".into(), "c".into()]);
        assert_eq!(sel.options(), vec!["a".into(), "c".into()]);

        let mut num = resolved(ResolvedKind::Number { min: 0, max: Some(5) });
        num.restrict_to(&[2.into(), 3.into()]);
        assert_eq!(num.kind, ResolvedKind::Number { min: 2, max: Some(3) });
    }

    #[test]
    fn test_json_shape() {
        let sel = resolved(ResolvedKind::Number { min: 1, max: Some(2) });
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["min"], 1);
        assert_eq!(json["max"], 2);
        assert_eq!(json["skipIf"], "only-one");

        let board = resolved(ResolvedKind::Board {
            choices: vec![el(1)],
            min: None,
            max: None,
        });
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["type"], "board");
        assert_eq!(json["boardChoices"][0], "$el[1]");
    }
}

//! Argument values exchanged between flows, actions and clients.
//!
//! An [`Argument`] is what a player commits for one selection, what a loop
//! captures as its counter, and what a switch captures as its matched value.
//! Board elements and players are carried as opaque handles; the board model
//! that knows what they mean is outside this crate.
//!
//! ## Wire Format
//!
//! Arguments serialize to plain JSON values. Players and elements become
//! compact string tokens:
//!
//! | Argument | JSON |
//! |---|---|
//! | `Player(PlayerId(1))` | `"$p[1]"` |
//! | `Element(ElementRef(42))` | `"$el[42]"` |
//! | `Text("$5")` | `"$$5"` (leading `$` escaped) |
//!
//! ```
//! use turnflow::core::{Argument, ElementRef, PlayerId};
//!
//! let arg = Argument::List(vec![PlayerId::new(1).into(), ElementRef(42).into()]);
//! let json = serde_json::to_string(&arg).unwrap();
//! assert_eq!(json, r#"["$p[1]","$el[42]"]"#);
//! ```

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use super::player::PlayerId;

/// Accumulated named arguments.
///
/// Ordered so JSON output is stable; persistent so the pending-move search
/// can fork partial argument sets in O(1).
pub type Args = im::OrdMap<String, Argument>;

/// Build an [`Args`] map from literal pairs.
///
/// ```
/// use turnflow::core::{args, Argument};
///
/// let a = args([("n", Argument::Number(1)), ("resource", "oil".into())]);
/// assert_eq!(a.get("n"), Some(&Argument::Number(1)));
/// ```
pub fn args<const N: usize>(pairs: [(&str, Argument); N]) -> Args {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Opaque handle to a board element.
///
/// The board collaborator assigns these (stable ids or structural paths
/// flattened to an integer); the flow engine only compares them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef(pub u32);

impl ElementRef {
    /// Create a new element reference.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single argument value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Argument {
    Bool(bool),
    Number(i64),
    Text(String),
    Player(PlayerId),
    Element(ElementRef),
    List(Vec<Argument>),
}

impl Argument {
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Argument::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Argument::Player(p) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<ElementRef> {
        match self {
            Argument::Element(e) => Some(*e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Argument]> {
        match self {
            Argument::List(items) => Some(items),
            _ => None,
        }
    }

    /// Parse a wire string back into an argument, undoing token encoding.
    fn from_wire_str(s: String) -> Self {
        if let Some(rest) = s.strip_prefix("$$") {
            return Argument::Text(format!("${rest}"));
        }
        if let Some(id) = token_body(&s, "$p[").and_then(|b| b.parse::<u8>().ok()) {
            return Argument::Player(PlayerId::new(id));
        }
        if let Some(id) = token_body(&s, "$el[").and_then(|b| b.parse::<u32>().ok()) {
            return Argument::Element(ElementRef::new(id));
        }
        Argument::Text(s)
    }
}

fn token_body<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(']')
}

impl std::fmt::Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Bool(b) => write!(f, "{b}"),
            Argument::Number(n) => write!(f, "{n}"),
            Argument::Text(s) => write!(f, "{s}"),
            Argument::Player(p) => write!(f, "{p}"),
            Argument::Element(e) => write!(f, "{e}"),
            Argument::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Argument::Bool(b) => serializer.serialize_bool(*b),
            Argument::Number(n) => serializer.serialize_i64(*n),
            Argument::Text(s) if s.starts_with('$') => serializer.serialize_str(&format!("${s}")),
            Argument::Text(s) => serializer.serialize_str(s),
            Argument::Player(p) => serializer.serialize_str(&format!("$p[{}]", p.0)),
            Argument::Element(e) => serializer.serialize_str(&format!("$el[{}]", e.0)),
            Argument::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireArgument {
    Bool(bool),
    Number(i64),
    Text(String),
    List(Vec<Argument>),
}

impl<'de> Deserialize<'de> for Argument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireArgument::deserialize(deserializer)? {
            WireArgument::Bool(b) => Argument::Bool(b),
            WireArgument::Number(n) => Argument::Number(n),
            WireArgument::Text(s) => Argument::from_wire_str(s),
            WireArgument::List(items) => Argument::List(items),
        })
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Bool(value)
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Number(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Number(i64::from(value))
    }
}

impl From<usize> for Argument {
    fn from(value: usize) -> Self {
        Argument::Number(value as i64)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<PlayerId> for Argument {
    fn from(value: PlayerId) -> Self {
        Argument::Player(value)
    }
}

impl From<ElementRef> for Argument {
    fn from(value: ElementRef) -> Self {
        Argument::Element(value)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(value: Vec<T>) -> Self {
        Argument::List(value.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(arg: &Argument) -> Argument {
        let json = serde_json::to_string(arg).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_primitive_json() {
        assert_eq!(serde_json::to_string(&Argument::Number(-3)).unwrap(), "-3");
        assert_eq!(serde_json::to_string(&Argument::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Argument::from("oil")).unwrap(), "\"oil\"");
    }

    #[test]
    fn test_reference_tokens() {
        let player = Argument::Player(PlayerId::new(3));
        let element = Argument::Element(ElementRef::new(17));

        assert_eq!(serde_json::to_string(&player).unwrap(), "\"$p[3]\"");
        assert_eq!(serde_json::to_string(&element).unwrap(), "\"$el[17]\"");
        assert_eq!(round_trip(&player), player);
        assert_eq!(round_trip(&element), element);
    }

    #[test]
    fn test_dollar_text_is_escaped() {
        let looks_like_token = Argument::from("$p[1]");
        let json = serde_json::to_string(&looks_like_token).unwrap();
        assert_eq!(json, "\"$$p[1]\"");
        assert_eq!(round_trip(&looks_like_token), looks_like_token);
    }

    #[test]
    fn test_malformed_token_stays_text() {
        let parsed: Argument = serde_json::from_str("\"$p[x]\"").unwrap();
        assert_eq!(parsed, Argument::from("$p[x]"));
    }

    #[test]
    fn test_nested_list() {
        let arg = Argument::List(vec![
            Argument::Number(1),
            Argument::List(vec![ElementRef::new(2).into(), "two".into()]),
        ]);
        assert_eq!(round_trip(&arg), arg);
    }

    #[test]
    fn test_display() {
        let arg: Argument = vec![Argument::Number(1), PlayerId::new(0).into()].into();
        assert_eq!(arg.to_string(), "1, Player 0");
        assert_eq!(Argument::Element(ElementRef::new(5)).to_string(), "#5");
    }

    #[test]
    fn test_args_helper() {
        let a = args([("b", 2.into()), ("a", 1.into())]);
        let keys: Vec<_> = a.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"a":1,"b":2}"#);
    }
}

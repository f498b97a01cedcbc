//! Interpreter signals and step-callback control values.

use crate::core::Args;

/// Result of driving one node by one unit.
///
/// `Continue`, `Repeat` and `Break` are loop interrupts: only loop-kind
/// nodes consume them, every other node hands them to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// One unit of work ran; the node has more to do.
    Ok,
    /// Nothing can run until a player submits a move.
    Awaiting,
    /// The node has finished.
    Complete,
    /// Skip the rest of this iteration.
    Continue,
    /// Restart this iteration without advancing the loop value.
    Repeat,
    /// Leave the enclosing loop.
    Break,
}

impl Signal {
    /// Is this a loop interrupt?
    #[must_use]
    pub fn is_interrupt(self) -> bool {
        matches!(self, Signal::Continue | Signal::Repeat | Signal::Break)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Signal::Ok => "ok",
            Signal::Awaiting => "awaiting",
            Signal::Complete => "complete",
            Signal::Continue => "continue",
            Signal::Repeat => "repeat",
            Signal::Break => "break",
        };
        f.write_str(name)
    }
}

/// Request to enter a named subflow once the current step returns.
#[derive(Clone, Debug, PartialEq)]
pub struct SubflowCall {
    pub name: String,
    pub args: Args,
}

impl SubflowCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    /// Add an entry argument for the subflow.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<crate::core::Argument>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// What a flow step callback asks the interpreter to do next.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Control {
    /// Move on to the next step.
    #[default]
    Proceed,
    /// Skip to the next iteration of the nearest loop.
    Continue,
    /// Redo the current iteration of the nearest loop.
    Repeat,
    /// Exit the nearest loop.
    Break,
    /// Move on, then run a subflow to completion before anything else.
    Subflow(SubflowCall),
}

impl Control {
    /// Enter the named subflow without entry arguments.
    pub fn subflow(name: impl Into<String>) -> Self {
        Control::Subflow(SubflowCall::new(name))
    }
}

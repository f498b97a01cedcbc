//! Fatal flow errors.
//!
//! These indicate a wrong flow definition or a caller driving the manager
//! out of protocol. Player mistakes (bad selections, unplayable actions)
//! are never reported here; they come back as plain message strings.

use thiserror::Error;

use super::player::PlayerId;

/// Errors that abort game construction or play.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Two flow nodes or subflows share a name.
    #[error("duplicate flow name '{0}'")]
    DuplicateName(String),

    /// Two actions were registered under one name.
    #[error("duplicate action '{0}'")]
    DuplicateAction(String),

    /// A subflow was entered that was never declared.
    #[error("unknown flow '{0}'")]
    UnknownFlow(String),

    /// An action step offers an action that was never declared.
    #[error("step '{step}' offers undeclared action '{action}'")]
    UnknownAction { step: String, action: String },

    /// The manager was driven before `start()`.
    #[error("game has not started")]
    NotStarted,

    /// `start()` was called twice.
    #[error("game has already started")]
    AlreadyStarted,

    /// The flow has run to completion.
    #[error("game is finished")]
    Finished,

    /// A move was submitted while no step awaits one.
    #[error("no step is awaiting a move")]
    NotAwaiting,

    /// A move came from a player who may not act now.
    #[error("{player} may not act at this point")]
    IneligiblePlayer { player: PlayerId },

    /// A continue/repeat/break signal escaped every loop.
    #[error("{signal} signal reached the root of flow '{flow}' without an enclosing loop")]
    UnhandledInterrupt { signal: String, flow: String },

    /// A persisted branch does not fit the flow definition.
    #[error("branch does not match flow '{flow}': {reason}")]
    InvalidBranch { flow: String, reason: String },

    /// A single `play()` exceeded the configured step budget.
    #[error("flow did not settle within {0} steps")]
    StepLimit(usize),

    /// An administrative move was attempted without permission.
    #[error("administrative moves are disabled")]
    GodModeDisabled,

    /// A recorded move was rejected during replay.
    #[error("replayed move {index} was rejected: {message}")]
    ReplayRejected { index: usize, message: String },

    /// Malformed JSON state or configuration.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = FlowError::IneligiblePlayer { player: PlayerId::new(1) };
        assert_eq!(err.to_string(), "Player 1 may not act at this point");

        let err = FlowError::UnknownAction {
            step: "turn".into(),
            action: "fly".into(),
        };
        assert_eq!(err.to_string(), "step 'turn' offers undeclared action 'fly'");
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<u8, _> = serde_json::from_str("nope");
        let err: FlowError = parse.unwrap_err().into();
        assert!(matches!(err, FlowError::Json(_)));
    }
}

//! Runtime configuration for a game manager.

use serde::{Deserialize, Serialize};

use super::error::Result;

/// Flow runtime configuration.
///
/// Loaded from JSON or built in code; missing fields take their defaults.
///
/// ```
/// use turnflow::core::FlowConfig;
///
/// let config = FlowConfig::from_json(r#"{ "seed": 7 }"#).unwrap();
/// assert_eq!(config.seed, 7);
/// assert!(!config.allow_god_mode);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Seed for the game's RNG.
    /// Same seed and same moves produce the same history.
    pub seed: u64,

    /// Maximum interpreter steps a single `play()` may take before it is
    /// treated as a runaway flow.
    pub max_steps_per_play: usize,

    /// Permit administrative moves that bypass validation.
    /// Never enable for production play.
    pub allow_god_mode: bool,

    /// Keep a record of accepted moves for replay.
    pub record_history: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            max_steps_per_play: 100_000,
            allow_god_mode: false,
            record_history: true,
        }
    }
}

impl FlowConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the per-play step limit.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps_per_play = max_steps;
        self
    }

    /// Allow administrative moves.
    #[must_use]
    pub fn with_god_mode(mut self) -> Self {
        self.allow_god_mode = true;
        self
    }

    /// Disable move history.
    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.record_history = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_steps_per_play, 100_000);
        assert!(!config.allow_god_mode);
        assert!(config.record_history);
    }

    #[test]
    fn test_builder() {
        let config = FlowConfig::default()
            .with_seed(9)
            .with_max_steps(50)
            .with_god_mode()
            .without_history();

        assert_eq!(config.seed, 9);
        assert_eq!(config.max_steps_per_play, 50);
        assert!(config.allow_god_mode);
        assert!(!config.record_history);
    }

    #[test]
    fn test_from_json_partial() {
        let config = FlowConfig::from_json(r#"{"allow_god_mode": true}"#).unwrap();
        assert!(config.allow_god_mode);
        assert_eq!(config.seed, FlowConfig::default().seed);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(FlowConfig::from_json("{ seed: ").is_err());
    }
}

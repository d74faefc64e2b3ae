//! Engine configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What to do when an interface obligation re-enters a `(type, interface)` pair that
/// is already being checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Fail with `CyclicObligation`.
    #[default]
    Reject,
    /// Treat the re-entered pair as satisfied.
    Assume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Placeholder used when a declaration gives no alias.
    pub default_placeholder: String,
    /// Owning scope for interfaces declared without one.
    pub default_scope: String,
    /// Longest chain of nested interface obligations before giving up.
    pub max_obligation_depth: usize,
    pub cycle_policy: CyclePolicy,
    /// Stop evaluating an alternative group at its first satisfied child.
    pub short_circuit_alternatives: bool,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            default_placeholder: "Self".to_string(),
            default_scope: "Main".to_string(),
            max_obligation_depth: 32,
            cycle_policy: CyclePolicy::Reject,
            short_circuit_alternatives: false,
        }
    }
}

impl ConformanceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !crate::contract::is_valid_binding(&self.default_placeholder) {
            return Err(ConfigError::Invalid(format!(
                "default_placeholder `{}` is not a valid binding name",
                self.default_placeholder
            )));
        }
        if self.max_obligation_depth == 0 {
            return Err(ConfigError::Invalid("max_obligation_depth must be at least 1".into()));
        }
        Ok(())
    }
}

// src/config.rs
//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Tunables for evaluation and storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop folding a rule once its result can no longer change
    pub short_circuit: bool,

    /// Evaluate `testing` rules alongside active ones when screening
    pub evaluate_testing_rules: bool,

    /// Count simulated fires in the effectiveness tracker
    pub record_testing_triggers: bool,

    /// Compiled size limit for `regex` patterns, in bytes
    pub regex_size_limit: usize,

    /// Previous versions kept per rule
    pub max_history_per_rule: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            short_circuit: true,
            evaluate_testing_rules: true,
            record_testing_triggers: true,
            regex_size_limit: 1 << 20,
            max_history_per_rule: 32,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regex_size_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "regex_size_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

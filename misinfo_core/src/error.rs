//! Error types for engine setup and tick execution.

use misinfo_env::{InputError, MisinfoId, UserId};
use thiserror::Error;

/// Configuration problems. All of these are fatal at setup time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Countermeasure `type` is not one of the known kinds
    #[error("Unknown countermeasure type: {0}")]
    UnknownCountermeasure(String),

    /// The same countermeasure kind is configured twice
    #[error("Countermeasure configured more than once: {0}")]
    DuplicateCountermeasure(String),

    /// A parameter is out of its allowed range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config document is malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an invalid-parameter error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while building or stepping the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// An event addressed a user that is not part of the run
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    /// A broadcast referenced an item the aggregation table never saw
    #[error("Unknown misinformation item: {0}")]
    UnknownMisinfo(MisinfoId),
}

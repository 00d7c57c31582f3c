//! Error type for the scenario harness.

use misinfo_core::{ConfigError, EngineError};
use misinfo_env::InputError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// A synthetic population parameter is out of range
    #[error("Invalid population parameter {name}: {reason}")]
    Population { name: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn population(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Population {
            name,
            reason: reason.into(),
        }
    }
}

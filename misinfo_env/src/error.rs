//! Error types for the input boundary.

use thiserror::Error;

/// Errors that can occur while loading pre-shaped input.
#[derive(Debug, Error)]
pub enum InputError {
    /// Dataset or config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid JSON for the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required top-level field is absent
    #[error("Missing field: {0}")]
    MissingField(String),
}

impl InputError {
    /// Creates a missing-field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }
}

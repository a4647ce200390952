//! Core Error Types
//!
//! Defines the foundational error types used across the Beacon workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! The application crate extends these with the runtime taxonomy (module
//! loading, registry, install, router) that needs heavier dependencies.

use thiserror::Error;

/// Core error type for the Beacon workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed action ids and similar parse failures
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rendering surface failures
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a surface error
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

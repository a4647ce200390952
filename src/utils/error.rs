//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use beacon_core::CoreError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from the core crate (manifest parsing, surfaces, action ids)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Malformed manifest, missing entry, bad identifiers
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entry module does not exist on disk
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// Plugin module failed to start or answer
    #[error("Module load error: {0}")]
    ModuleLoad(String),

    /// Another request is already loading the module
    #[error("Module busy: {0}")]
    ModuleBusy(String),

    /// A plugin handler reported a failure
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// Registry unreachable or returned a bad response
    #[error("Registry error: {0}")]
    Registry(String),

    /// Plugin installation failed (nothing was left behind)
    #[error("Install error: {0}")]
    Install(String),

    /// Plugin removal failed
    #[error("Uninstall error: {0}")]
    Uninstall(String),

    /// Rendering surface errors
    #[error("View error: {0}")]
    View(String),

    /// A channel was registered twice
    #[error("Channel already registered: {0}")]
    DuplicateChannel(String),

    /// No handler for the requested channel
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a module load error
    pub fn module_load(msg: impl Into<String>) -> Self {
        Self::ModuleLoad(msg.into())
    }

    /// Create an action failure
    pub fn action_failed(msg: impl Into<String>) -> Self {
        Self::ActionFailed(msg.into())
    }

    /// Create a registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create an install error
    pub fn install(msg: impl Into<String>) -> Self {
        Self::Install(msg.into())
    }

    /// Create an uninstall error
    pub fn uninstall(msg: impl Into<String>) -> Self {
        Self::Uninstall(msg.into())
    }

    /// Create a view error
    pub fn view(msg: impl Into<String>) -> Self {
        Self::View(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Registry(err.to_string())
    }
}

/// Convert AppError to a string suitable for Tauri command responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::install("download failed");
        assert_eq!(err.to_string(), "Install error: download failed");
    }

    #[test]
    fn test_error_conversion() {
        let err = AppError::config("invalid setting");
        let msg: String = err.into();
        assert!(msg.contains("Configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let app_err: AppError = CoreError::parse("bad action id").into();
        assert_eq!(app_err.to_string(), "Parse error: bad action id");
    }
}

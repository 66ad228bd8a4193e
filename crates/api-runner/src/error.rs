//! # Runner Errors
//!
//! This module defines the error types shared by the dispatcher, the run tracker
//! and plugin handlers. Engine-level failures are [`RunnerError`]; anything a
//! plugin handler produces is a [`HandlerError`], which the dispatcher reports
//! instead of propagating.

/// Errors raised by the engine itself.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("api: \"{0}\" is not a valid lifecycle api")]
    UnknownEvent(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Run not open: {0}")]
    UnknownRun(String),
    #[error("Run tracker closed")]
    TrackerClosed,
    #[error("Run tracker dropped response channel")]
    TrackerDropped,
    #[error("Invalid runner config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Failed to read runner config: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure produced by a plugin handler.
///
/// Handlers return this from any of the supported handler styles. The
/// dispatcher never lets it escape a dispatch call: it is turned into a
/// `PluginHandlerError` report tagged with the plugin and event.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error, keeping it as the source.
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RunnerError> for HandlerError {
    fn from(error: RunnerError) -> Self {
        Self::from_error(error)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

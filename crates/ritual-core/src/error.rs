//! Core error types for ritual-core.
//!
//! Countdown misuse is never an error (it is logged and ignored), so the
//! hierarchy here covers configuration, the rendezvous action surface and
//! the caller-supplied commit operation.

use std::path::PathBuf;
use thiserror::Error;

use crate::rendezvous::OverlayState;

/// Core error type for ritual-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rendezvous action rejected
    #[error("Rendezvous error: {0}")]
    Rendezvous(#[from] RendezvousError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Could not locate the configuration directory
    #[error("Configuration directory unavailable: {0}")]
    NoConfigDir(String),
}

/// Rejected calls on the rendezvous action surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendezvousError {
    #[error("rendezvous has not begun")]
    NotStarted,

    #[error("rendezvous already begun")]
    AlreadyBegun,

    #[error("retry is only allowed from the error state (current: {state:?})")]
    RetryNotAllowed { state: OverlayState },

    #[error("a commit attempt is already in flight")]
    CommitInFlight,

    #[error("dismiss is only allowed from a terminal state (current: {state:?})")]
    DismissNotAllowed { state: OverlayState },

    #[error("rendezvous already dismissed")]
    AlreadyDismissed,

    /// The controller task is gone (dismissed or torn down).
    #[error("rendezvous controller is no longer running")]
    ControllerGone,
}

/// Failure reported by a caller-supplied commit operation.
///
/// Only the message survives; the controller never inspects the cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CommitError {
    message: String,
}

impl CommitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build from any error, keeping its display text.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message to show the user, or `fallback` when this one is blank.
    pub fn user_message(&self, fallback: &str) -> String {
        let trimmed = self.message.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl From<String> for CommitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for CommitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for CommitError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CommitError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

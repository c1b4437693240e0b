//! Error types for Fluentify.

use thiserror::Error;

/// Primary error type for all Fluentify operations.
#[derive(Error, Debug)]
pub enum FluentifyError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FluentifyError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error must end an active session.
    ///
    /// Decode failures drop a single audio chunk and leave the session running;
    /// everything touching permissions, transport, or credentials forces teardown.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Decode(_) | Self::InvalidState(_) | Self::Serialization(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FluentifyError>;

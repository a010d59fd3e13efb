//! Error types for gemma sessions

use thiserror::Error;

use crate::types::phase::Phase;

/// Main error type for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Binary missing, not executable, or rejected by the OS
    #[error("Failed to spawn inference binary: {0}")]
    Spawn(String),

    /// A request was issued while the session was not waiting for input
    #[error("Session is not ready for input (phase: {phase})")]
    NotReady {
        /// Phase observed when the request was rejected
        phase: Phase,
    },

    /// A request was issued while another exchange was still outstanding
    #[error("Session is busy with another exchange")]
    Busy,

    /// Readiness or a response was not observed within the deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The child process exited; the session cannot be used any more
    #[error("Session closed ({} partial chunk(s) received)", partial.len())]
    SessionClosed {
        /// Response content classified before the process went away
        partial: Vec<String>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request text that cannot be sent as a single line
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a not-ready error for the given phase
    #[must_use]
    pub const fn not_ready(phase: Phase) -> Self {
        Self::NotReady { phase }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a session closed error carrying any partial response
    #[must_use]
    pub const fn closed(partial: Vec<String>) -> Self {
        Self::SessionClosed { partial }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Whether the caller may retry on the same session
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotReady { .. } | Self::Busy | Self::Timeout(_) | Self::InvalidRequest(_)
        )
    }

    /// Partial response content attached to a [`SessionError::SessionClosed`]
    #[must_use]
    pub fn partial(&self) -> Option<&[String]> {
        match self {
            Self::SessionClosed { partial } => Some(partial),
            _ => None,
        }
    }
}

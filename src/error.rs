//! Error types for webwx-client.

use std::time::Duration;

use thiserror::Error;

/// Main error type for webwx-client operations.
#[derive(Error, Debug)]
pub enum WebWxError {
    /// Network, DNS, or TLS failure while talking to the remote service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be decoded (XML, JSON, or JS literal).
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote service returned a well-formed body with a non-success
    /// status code.
    #[error("protocol error {code}: {message}")]
    Protocol {
        /// Status code reported inside the response body.
        code: i64,
        /// Server-supplied message, if any.
        message: String,
    },

    /// Operation attempted on a session that has not completed login.
    #[error("not logged in")]
    NotLoggedIn,

    /// Login-status polling exceeded its deadline without a scan.
    #[error("login timed out after {0:?}")]
    LoginTimeout(Duration),

    /// Handshake aborted by an external cancellation signal.
    #[error("login canceled")]
    Canceled,

    /// Session with the given key was not found in the registry.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// State the session was in.
        from: crate::session::SessionState,
        /// State the transition targeted.
        to: crate::session::SessionState,
    },

    /// The login admission queue is full.
    #[error("login queue full")]
    QueueFull,

    /// I/O error (media file access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl WebWxError {
    /// Build a protocol error from a decoded response status.
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }
}

/// Convenience Result type for webwx-client operations.
pub type Result<T> = std::result::Result<T, WebWxError>;

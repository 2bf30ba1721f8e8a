//! Common error types for facelink.

use thiserror::Error;

/// Result type alias using facelink's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for facelink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, file, stdin)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unexpected signaling message or track
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The WebRTC engine rejected a description or candidate
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// Signaling transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Media stream, encode or decode failure
    #[error("media error: {0}")]
    Media(String),

    /// A required device or engine resource is unavailable
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// Operation on a channel or connection that is already closed
    #[error("closed: {0}")]
    Closed(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a negotiation error from any displayable type.
    pub fn negotiation(msg: impl std::fmt::Display) -> Self {
        Self::Negotiation(msg.to_string())
    }

    /// Create a transport error from any displayable type.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a media error from any displayable type.
    pub fn media(msg: impl std::fmt::Display) -> Self {
        Self::Media(msg.to_string())
    }

    /// Create a resource error from any displayable type.
    pub fn resource(msg: impl std::fmt::Display) -> Self {
        Self::Resource(msg.to_string())
    }

    /// Create a closed error from any displayable type.
    pub fn closed(msg: impl std::fmt::Display) -> Self {
        Self::Closed(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Whether the error belongs to the session-fatal protocol class.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

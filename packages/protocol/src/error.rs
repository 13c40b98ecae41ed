//! Protocol violation errors
//!
//! Every way a frame can fail to decode into a typed event. Nothing here is
//! fatal: the controller discards the frame, the client degrades its display.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Frame was not a JSON envelope
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame belongs to another namespace on the same connection
    #[error("namespace mismatch: expected {expected}, got {actual}")]
    NamespaceMismatch { expected: String, actual: String },

    /// Event name is not part of the vocabulary
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Payload missing required fields or carrying the wrong types
    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },

    /// Mode code or tag outside the closed enumeration
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// Operating state code or tag outside the closed enumeration
    #[error("unknown operating state: {0}")]
    UnknownState(String),
}

impl ProtocolError {
    pub fn invalid_payload(event: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            reason: reason.to_string(),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

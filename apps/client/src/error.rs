//! Client error types

use thermo_protocol::ProtocolError;
use thermo_shared_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket connection could not be established
    #[error("websocket connect failed: {0}")]
    Connect(String),

    /// Reconnection limit reached
    #[error("gave up after {0} reconnection attempts")]
    RetriesExhausted(u32),

    /// Controller sent something outside the protocol
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// History request failed at the HTTP layer
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// History endpoint answered with an error status
    #[error("history endpoint returned {status}: {body}")]
    HistoryStatus { status: u16, body: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// User input that does not name an intent
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type ClientResult<T> = Result<T, ClientError>;

//! Error handling for the thermostat controller
//!
//! HTTP failures use [`ApiError`], which maps onto a status code and a JSON
//! `{code, message}` body through Axum's `IntoResponse`. Failures on the sync
//! channel never produce a response frame; they are [`CommandError`] and
//! [`StateError`] values that the caller logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thermo_protocol::{OperatingState, ProtocolError};
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

/// HTTP API error
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid path or query parameter
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParam { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidParam { .. } => "INVALID_PARAM",
        }
    }

    /// Log the rejected request
    pub fn log(&self) {
        tracing::debug!(
            error = %self,
            code = self.error_code(),
            status = self.status_code().as_u16(),
            "Client error"
        );
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Why a client command was not applied
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Frame could not be decoded into a command
    #[error("undecodable command: {0}")]
    Decode(#[from] ProtocolError),

    #[error("desired temperature {value} is outside {min}..={max}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("desired temperature must be a finite number, got {0}")]
    NotFinite(f64),
}

impl CommandError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "INVALID_COMMAND",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::NotFinite(_) => "NOT_FINITE",
        }
    }
}

/// Rejected operating-state write from the HVAC loop
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum StateError {
    #[error("operating state {state} is not permitted while enabled={enabled}")]
    NotPermitted {
        state: OperatingState,
        enabled: bool,
    },
}

//! Error types for the poker hub
//!
//! Defines connection-level errors, handshake rejections and
//! configuration errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite::handshake::server::ErrorResponse;
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Application-level errors
///
/// Every variant is fatal to the connection that produced it and to
/// nothing else. Malformed payloads never surface here: they are logged
/// and skipped inside the read loop.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The hub actor is no longer receiving commands
    #[error("Hub closed")]
    HubClosed,

    /// The upgrade request was refused before reaching the hub
    #[error("Handshake rejected: {0}")]
    Rejected(#[from] Rejection),
}

/// Reasons an upgrade request is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// `room` or `name` query parameter absent or empty
    #[error("missing room or name")]
    MissingParameters,

    /// Request targeted something other than the upgrade path
    #[error("unknown path: {0}")]
    UnknownPath(String),
}

impl Rejection {
    /// HTTP status sent back to the client
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingParameters => StatusCode::BAD_REQUEST,
            Rejection::UnknownPath(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Handshake response sent in place of the upgrade
    pub fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.to_string()));
        *response.status_mut() = self.status();
        response
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting did not parse as a positive integer
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidCapacity { name: &'static str, value: String },

    /// Unknown identity mode
    #[error("unknown identity mode '{0}' (expected 'generated' or 'client')")]
    InvalidIdentity(String),
}

//! Protocol error types.

use thiserror::Error;

/// Errors talking to the server.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Username or password rejected. Fatal to the worker process.
    #[error("Server rejected credentials")]
    BadCredentials,

    /// The stored machine id is unknown to the server.
    #[error("Server rejected machine id")]
    BadMachineId,

    /// The worker is older than the server accepts.
    #[error("Server rejected client version")]
    BadClientVersion,

    /// Any other error reported by the server.
    #[error("Server error: {0}")]
    Server(String),

    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response body could not be decoded.
    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl ProtocolError {
    /// Classifies the message of an `error` envelope.
    pub fn from_server_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("client version") {
            ProtocolError::BadClientVersion
        } else if lower.contains("machine id") {
            ProtocolError::BadMachineId
        } else if lower.contains("credentials") {
            ProtocolError::BadCredentials
        } else {
            ProtocolError::Server(message.to_string())
        }
    }

    /// Errors worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProtocolError::Server(_) | ProtocolError::Http(_) | ProtocolError::Decode(_)
        )
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(e: reqwest::Error) -> Self {
        ProtocolError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Decode(e.to_string())
    }
}

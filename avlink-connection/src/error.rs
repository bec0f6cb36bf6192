//! Error types for the connection layer

use std::time::Duration;

use avlink_protocol::ProtocolError;
use avlink_transport::TransportError;

/// Errors surfaced by [`Connection`](crate::Connection) operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// No correlated response arrived in time; the caller may retry
    #[error("No response to {command} within {timeout:?}")]
    Timeout {
        /// The command that went unanswered
        command: String,
        /// How long the sender waited
        timeout: Duration,
    },

    /// The stream could not be opened or broke; the device is offline
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailure {
        /// The device endpoint
        endpoint: String,
        /// What went wrong
        reason: String,
    },

    /// The device rejected the session credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// A line or command could not be parsed or built
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection was closed and cannot be used any more
    #[error("Connection closed")]
    Closed,

    /// Invalid connection settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A background thread could not be spawned
    #[error("Failed to start thread {0}")]
    Thread(String),
}

impl ConnectionError {
    pub(crate) fn failure(endpoint: &str, reason: impl ToString) -> Self {
        ConnectionError::ConnectionFailure {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_transport(endpoint: &str, error: TransportError) -> Self {
        Self::failure(endpoint, error)
    }

    pub(crate) fn from_handshake(endpoint: &str, error: ProtocolError) -> Self {
        if error.is_authentication() {
            ConnectionError::AuthenticationFailure(error.to_string())
        } else {
            Self::failure(endpoint, error)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout { .. })
    }

    /// True when the device should be considered offline
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectionFailure { .. } | ConnectionError::Closed
        )
    }
}

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;

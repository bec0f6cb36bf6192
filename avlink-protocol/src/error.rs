//! Error types for wire message parsing and building

use thiserror::Error;

/// Errors produced while parsing device lines or building commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line did not match any known response type
    #[error("No matching response type for {0:?}")]
    UnknownResponse(String),

    /// A command parameter did not match the pattern required by the command
    #[error("Invalid parameter {value:?} for {command}: expected {pattern}")]
    InvalidParameter {
        /// The command the parameter was meant for
        command: String,
        /// The rejected value
        value: String,
        /// The pattern the value must match
        pattern: String,
    },

    /// A numeric field could not be read
    #[error("Invalid numeric value {0:?}")]
    InvalidNumber(String),

    /// A response value was not what its command allows
    #[error("Unexpected value {value:?} for {field}")]
    UnexpectedValue {
        /// What was being decoded
        field: &'static str,
        /// The raw value received
        value: String,
    },

    /// A PJLink input description was malformed
    #[error("Invalid input {0:?}")]
    InvalidInput(String),

    /// The device greeting could not be understood
    #[error("Invalid greeting {0:?}")]
    InvalidGreeting(String),

    /// The device requires authentication but no password is configured
    #[error("Device requires authentication but no password is configured")]
    PasswordRequired,

    /// The device rejected the authentication digest
    #[error("Authentication rejected by device, wrong password?")]
    AuthenticationRejected,

    /// User supplied model overrides are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ProtocolError {
    /// True for errors that mean the session is not authorised
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            ProtocolError::PasswordRequired | ProtocolError::AuthenticationRejected
        )
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

use avlink_connection::ConnectionError;
use avlink_protocol::ProtocolError;
use thiserror::Error;

use crate::channel::{ChannelKind, CommandValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The channel does not accept this kind of value; nothing was sent
    #[error("Command {value} not supported on channel {channel}")]
    CommandNotSupported {
        channel: ChannelKind,
        value: CommandValue,
    },

    #[error("Device did not answer: {0}")]
    Timeout(String),

    #[error("Device offline: {0}")]
    Offline(String),

    /// The device answered with one of its error codes
    #[error("Device rejected the command: {0}")]
    Rejected(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<ConnectionError> for DeviceError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::Timeout { .. } => DeviceError::Timeout(error.to_string()),
            ConnectionError::ConnectionFailure { .. } | ConnectionError::Closed => {
                DeviceError::Offline(error.to_string())
            }
            ConnectionError::AuthenticationFailure(reason) => {
                DeviceError::AuthenticationFailure(reason)
            }
            ConnectionError::Protocol(e) => DeviceError::Protocol(e),
            ConnectionError::Configuration(reason) => DeviceError::Config(reason),
            ConnectionError::Thread(_) => DeviceError::Connection(error.to_string()),
        }
    }
}

impl DeviceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Timeout(_))
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, DeviceError::Offline(_))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

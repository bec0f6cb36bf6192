//! Error types for the transport layer

use std::io;
use thiserror::Error;

/// Errors that can occur while opening or using a device stream
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host name did not resolve to any socket address
    #[error("Failed to resolve address: {0}")]
    Resolve(String),

    /// Every resolved address refused or timed out
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        /// Human readable endpoint description
        target: String,
        /// The last connection error observed
        #[source]
        source: io::Error,
    },

    /// The serial port could not be opened or configured
    #[error("Serial port error on {port}: {message}")]
    Serial {
        /// The serial device path
        port: String,
        /// The driver error message
        message: String,
    },

    /// The peer closed the stream
    #[error("Stream closed by peer")]
    Closed,

    /// Any other I/O failure on an open stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True when the error means the stream is gone for good
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::Resolve("receiver.local:23".to_string());
        assert_eq!(err.to_string(), "Failed to resolve address: receiver.local:23");

        let err = TransportError::Connect {
            target: "10.0.0.5:23".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.to_string(), "Failed to connect to 10.0.0.5:23: refused");

        let err = TransportError::Closed;
        assert_eq!(err.to_string(), "Stream closed by peer");
    }

    #[test]
    fn test_interrupted_is_not_fatal() {
        let err = TransportError::Io(io::Error::new(io::ErrorKind::Interrupted, "signal"));
        assert!(!err.is_fatal());
        assert!(TransportError::Closed.is_fatal());
    }
}

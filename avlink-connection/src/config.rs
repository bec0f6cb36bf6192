//! Connection timing configuration

use std::time::Duration;

use crate::error::{ConnectionError, Result};

/// Timeouts and delays used by a [`Connection`](crate::Connection).
///
/// The defaults are the values the receiver protocol is designed around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long a sender waits for its correlated response
    pub response_timeout: Duration,

    /// Debounce window for notifications of the same type
    pub notification_delay: Duration,

    /// Read timeout of the stream, bounds how fast the reader notices close
    pub read_timeout: Duration,

    /// Limit for opening the stream and receiving a greeting
    pub connect_timeout: Duration,

    /// Delay before the first health probe once a device goes offline
    pub health_check_initial_delay: Duration,

    /// Delay between health probes while the device stays offline
    pub health_check_period: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            notification_delay: Duration::from_millis(250),
            read_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            health_check_initial_delay: Duration::from_secs(1),
            health_check_period: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timings for local links and tests
    pub fn fast() -> Self {
        Self {
            response_timeout: Duration::from_millis(200),
            notification_delay: Duration::from_millis(50),
            read_timeout: Duration::from_millis(50),
            connect_timeout: Duration::from_millis(500),
            health_check_initial_delay: Duration::from_millis(50),
            health_check_period: Duration::from_millis(200),
        }
    }

    /// Generous timings for slow serial links or busy projectors
    pub fn lenient() -> Self {
        Self {
            response_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            health_check_period: Duration::from_secs(30),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.response_timeout.is_zero() {
            return Err(ConnectionError::Configuration(
                "Response timeout must be greater than zero".to_string(),
            ));
        }
        if self.read_timeout.is_zero() {
            // A zero read timeout means "block forever" to the socket layer
            return Err(ConnectionError::Configuration(
                "Read timeout must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConnectionError::Configuration(
                "Connect timeout must be greater than zero".to_string(),
            ));
        }
        if self.health_check_period.is_zero() {
            return Err(ConnectionError::Configuration(
                "Health check period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_notification_delay(mut self, delay: Duration) -> Self {
        self.notification_delay = delay;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_health_check(mut self, initial_delay: Duration, period: Duration) -> Self {
        self.health_check_initial_delay = initial_delay;
        self.health_check_period = period;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = ConnectionConfig::default();
        assert_eq!(config.response_timeout, Duration::from_millis(500));
        assert_eq!(config.notification_delay, Duration::from_millis(250));
        assert_eq!(config.health_check_initial_delay, Duration::from_secs(1));
        assert_eq!(config.health_check_period, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ConnectionConfig::fast().validate().is_ok());
        assert!(ConnectionConfig::lenient().validate().is_ok());
        assert!(ConnectionConfig::lenient().response_timeout > ConnectionConfig::default().response_timeout);
    }

    #[test]
    fn test_validation() {
        let config = ConnectionConfig::default().with_response_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConnectionError::Configuration(_))
        ));

        let config = ConnectionConfig::default().with_read_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ConnectionConfig::default().with_health_check(Duration::ZERO, Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = ConnectionConfig::new()
            .with_notification_delay(Duration::from_millis(100))
            .with_health_check(Duration::from_millis(10), Duration::from_secs(1));
        assert_eq!(config.notification_delay, Duration::from_millis(100));
        assert_eq!(config.health_check_initial_delay, Duration::from_millis(10));
    }
}

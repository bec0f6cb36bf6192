//! Logging setup for applications embedding avlink
//!
//! The library crates only emit `tracing` events. This module installs a
//! subscriber for binaries that do not bring their own.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable selecting the logging mode
pub const MODE_ENV: &str = "AVLINK_LOG";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// No subscriber is installed
    #[default]
    Silent,
    /// Compact stderr output at info level
    Development,
    /// JSON lines at debug level, including wire traffic
    Debug,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "silent" | "off" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(LoggingError::InvalidEnv(format!(
                "{MODE_ENV}={other} (expected silent, development or debug)"
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for `mode`.
///
/// `RUST_LOG`, when set, replaces the mode's default level filter.
///
/// ```rust,ignore
/// avlink::logging::init_logging(LoggingMode::Development)?;
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info");

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug");

            Registry::default()
                .with(
                    fmt::layer()
                        .json()
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize from `AVLINK_LOG`; unset means silent
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var(MODE_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => LoggingMode::Silent,
    };
    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(default_level),
    }
}

/// True when a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("silent", LoggingMode::Silent)]
    #[case("", LoggingMode::Silent)]
    #[case("Development", LoggingMode::Development)]
    #[case("debug", LoggingMode::Debug)]
    fn test_mode_parsing(#[case] value: &str, #[case] mode: LoggingMode) {
        assert_eq!(value.parse::<LoggingMode>().unwrap(), mode);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(matches!(
            "verbose".parse::<LoggingMode>(),
            Err(LoggingError::InvalidEnv(_))
        ));
    }

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }
}

//! Device configuration loaded from JSON
//!
//! ```json
//! {
//!   "endpoint": { "type": "tcp", "host": "192.168.1.20" },
//!   "model": "VSX-1120",
//!   "overrides": { "burst_mode": false }
//! }
//! ```

use std::path::Path;

use avlink_protocol::{avr, pjlink, ModelOverrides, ModelProperties};
use avlink_transport::{SerialTransport, TcpTransport, Transport, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

fn default_avr_port() -> u16 {
    avr::DEFAULT_PORT
}

fn default_pjlink_port() -> u16 {
    pjlink::DEFAULT_PORT
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_model() -> String {
    ModelProperties::CONFIGURABLE.to_string()
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

/// Where a receiver is reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Endpoint {
    Tcp {
        host: String,
        #[serde(default = "default_avr_port")]
        port: u16,
    },
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port: avr::DEFAULT_PORT,
        }
    }

    pub fn serial(port: impl Into<String>) -> Self {
        Endpoint::Serial {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        match self {
            Endpoint::Tcp { host, port } => Box::new(TcpTransport::new(host.clone(), *port)),
            Endpoint::Serial { port, baud_rate } => {
                Box::new(SerialTransport::new(port.clone()).with_baud_rate(*baud_rate))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Endpoint::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(DeviceError::Config("TCP host must not be empty".to_string()));
                }
                if *port == 0 {
                    return Err(DeviceError::Config("TCP port must not be 0".to_string()));
                }
            }
            Endpoint::Serial { port, baud_rate } => {
                if port.trim().is_empty() {
                    return Err(DeviceError::Config("Serial port must not be empty".to_string()));
                }
                if *baud_rate == 0 {
                    return Err(DeviceError::Config("Baud rate must not be 0".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Configuration of one AV receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub endpoint: Endpoint,

    /// Catalogue model name; unknown names use the configurable model
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "ModelOverrides::is_empty")]
    pub overrides: ModelOverrides,
}

impl ReceiverConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            model: default_model(),
            overrides: ModelOverrides::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_overrides(mut self, overrides: ModelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DeviceError::Config(format!("Invalid receiver configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint.validate()?;
        self.overrides.validate()?;
        Ok(())
    }

    /// Catalogue model with the overrides applied
    pub fn model_properties(&self) -> Result<ModelProperties> {
        let base = ModelProperties::for_model(&self.model).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown receiver model '{}', using the {} model",
                self.model,
                ModelProperties::CONFIGURABLE
            );
            ModelProperties::configurable()
        });
        Ok(base.with_overrides(&self.overrides)?)
    }
}

/// Configuration of one PJLink projector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorConfig {
    pub host: String,

    #[serde(default = "default_pjlink_port")]
    pub port: u16,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Seconds between refresh polls, 0 disables polling
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_true")]
    pub refresh_power: bool,

    #[serde(default)]
    pub refresh_mute: bool,

    #[serde(default)]
    pub refresh_input: bool,
}

impl ProjectorConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: pjlink::DEFAULT_PORT,
            password: None,
            refresh_interval_secs: default_refresh_interval(),
            refresh_power: true,
            refresh_mute: false,
            refresh_input: false,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_refresh(
        mut self,
        interval_secs: u64,
        power: bool,
        mute: bool,
        input: bool,
    ) -> Self {
        self.refresh_interval_secs = interval_secs;
        self.refresh_power = power;
        self.refresh_mute = mute;
        self.refresh_input = input;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DeviceError::Config(format!("Invalid projector configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DeviceError::Config("Projector host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(DeviceError::Config("Projector port must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn transport(&self) -> TcpTransport {
        TcpTransport::new(self.host.clone(), self.port)
    }

    /// True when at least one channel is polled
    pub fn is_refresh_enabled(&self) -> bool {
        self.refresh_interval_secs > 0
            && (self.refresh_power || self.refresh_mute || self.refresh_input)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DeviceError::Config(format!("Cannot read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_receiver_defaults() {
        let config =
            ReceiverConfig::from_json_str(r#"{"endpoint": {"type": "tcp", "host": "avr.local"}}"#)
                .unwrap();
        assert_eq!(config.endpoint, Endpoint::tcp("avr.local"));
        assert_eq!(config.model, ModelProperties::CONFIGURABLE);
        assert!(config.overrides.is_empty());
        assert_eq!(config.endpoint.transport().describe(), "avr.local:23");
    }

    #[test]
    fn test_receiver_with_overrides() {
        let config = ReceiverConfig::from_json_str(
            r#"{
                "endpoint": {"type": "serial", "port": "/dev/ttyUSB0"},
                "model": "VSX-1120",
                "overrides": {"burst_mode": false, "volume": {"2": {"max_db": -10.0}}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.endpoint, Endpoint::serial("/dev/ttyUSB0"));

        let model = config.model_properties().unwrap();
        assert_eq!(model.model_name(), "VSX-1120");
        assert!(!model.is_burst_mode_enabled());
        assert_eq!(model.zone(2).max_db, -10.0);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let config = ReceiverConfig::new(Endpoint::tcp("avr")).with_model("VSX-9999");
        let model = config.model_properties().unwrap();
        assert_eq!(model.model_name(), ModelProperties::CONFIGURABLE);
        assert_eq!(model.nb_zones(), 4);
    }

    #[test]
    fn test_invalid_receiver_configs() {
        assert!(ReceiverConfig::from_json_str("{}").is_err());
        assert!(matches!(
            ReceiverConfig::from_json_str(r#"{"endpoint": {"type": "tcp", "host": ""}}"#),
            Err(DeviceError::Config(_))
        ));
        assert!(matches!(
            ReceiverConfig::from_json_str(
                r#"{"endpoint": {"type": "tcp", "host": "a"}, "overrides": {"zones": 7}}"#
            ),
            Err(DeviceError::Protocol(_))
        ));
    }

    #[test]
    fn test_projector_defaults() {
        let config = ProjectorConfig::from_json_str(r#"{"host": "10.0.0.8"}"#).unwrap();
        assert_eq!(config.port, 4352);
        assert_eq!(config.password, None);
        assert_eq!(config.refresh_interval_secs, 5);
        assert!(config.refresh_power);
        assert!(!config.refresh_mute);
        assert!(config.is_refresh_enabled());
        assert_eq!(config.transport().describe(), "10.0.0.8:4352");
    }

    #[test]
    fn test_projector_password_is_not_serialized() {
        let config = ProjectorConfig::new("beamer").with_password("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_projector_refresh_disabled() {
        let config = ProjectorConfig::new("beamer").with_refresh(0, true, true, true);
        assert!(!config.is_refresh_enabled());
        let config = ProjectorConfig::new("beamer").with_refresh(10, false, false, false);
        assert!(!config.is_refresh_enabled());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": "beamer", "password": "JBMIAProjectorLink"}}"#).unwrap();

        let config = ProjectorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.password.as_deref(), Some("JBMIAProjectorLink"));

        assert!(ProjectorConfig::from_file("/nonexistent/avlink.json").is_err());
    }
}

//! RS-232 transport for receivers wired to a serial port

use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::error::{Result, TransportError};
use crate::{Stream, Transport};

/// Pioneer receivers talk 9600 8N1 on their RS-232 port
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Opens a serial device such as `/dev/ttyUSB0` or `COM3`
#[derive(Debug, Clone)]
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    fn serial_error(&self, error: serialport::Error) -> TransportError {
        TransportError::Serial {
            port: self.port.clone(),
            message: error.to_string(),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&self, read_timeout: Duration) -> Result<Stream> {
        let port = serialport::new(self.port.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| self.serial_error(e))?;
        let writer = port.try_clone().map_err(|e| self.serial_error(e))?;
        tracing::info!("Opened serial port {} at {} baud", self.port, self.baud_rate);

        // Serial reads wake up on their own timeout, so no shutdown hook is needed
        Ok(Stream::new(Box::new(port), Box::new(writer)))
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let transport = SerialTransport::new("/dev/ttyUSB0");
        assert_eq!(transport.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(transport.describe(), "serial:/dev/ttyUSB0");
    }

    #[test]
    fn test_missing_port_is_a_serial_error() {
        let transport = SerialTransport::new("/dev/avlink-does-not-exist");
        assert!(matches!(
            transport.open(Duration::from_millis(50)),
            Err(TransportError::Serial { .. })
        ));
    }
}

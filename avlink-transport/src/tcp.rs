//! TCP transport for network receivers and projectors

use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::{Stream, Transport};

/// Connects to a device over a plain TCP socket
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn connect(&self) -> Result<TcpStream> {
        let target = self.describe();
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Resolve(target.clone()))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connection attempt to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(TransportError::Connect { target, source }),
            None => Err(TransportError::Resolve(target)),
        }
    }
}

impl Transport for TcpTransport {
    fn open(&self, read_timeout: Duration) -> Result<Stream> {
        let stream = self.connect()?;
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_nodelay(true)?;

        let writer = stream.try_clone()?;
        let closer = stream.try_clone()?;
        tracing::info!("Connected to {}", self.describe());

        Ok(
            Stream::new(Box::new(stream), Box::new(writer)).with_shutdown(move || {
                // Already-closed sockets report NotConnected, which is fine here
                let _ = closer.shutdown(Shutdown::Both);
            }),
        )
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineReader;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn test_describe() {
        let transport = TcpTransport::new("192.168.1.20", 23);
        assert_eq!(transport.describe(), "192.168.1.20:23");
        assert_eq!(transport.port(), 23);
    }

    #[test]
    fn test_open_reads_lines_and_shutdown_ends_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"PWR0\r\n").unwrap();
            socket
        });

        let transport = TcpTransport::new("127.0.0.1", port);
        let stream = transport.open(Duration::from_millis(200)).unwrap();
        let (reader, _writer, shutdown) = stream.into_parts();
        let mut lines = LineReader::new(reader);

        let mut line = None;
        for _ in 0..10 {
            line = lines.read_line().unwrap();
            if line.is_some() {
                break;
            }
        }
        assert_eq!(line, Some("PWR0".to_string()));

        let _socket = server.join().unwrap();
        shutdown.shutdown();
        assert!(lines.read_line().is_err());
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport =
            TcpTransport::new("127.0.0.1", port).with_connect_timeout(Duration::from_millis(200));
        assert!(matches!(
            transport.open(Duration::from_millis(100)),
            Err(TransportError::Connect { .. })
        ));
    }
}

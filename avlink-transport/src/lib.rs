//! Byte-stream transports for avlink devices
//!
//! This crate opens the raw stream to a device (a TCP socket for network
//! receivers and projectors, or a serial port for RS-232 receivers) and hands
//! it to the connection layer as an independent reader and writer. Reads use a
//! bounded timeout so that the reader thread can notice cancellation.
//!
//! [`LineReader`] turns the byte stream into protocol lines. Both supported
//! protocols terminate messages with `\r`, some devices add `\n`.

mod error;
mod line;
mod serial;
mod tcp;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::{Result, TransportError};
pub use line::LineReader;
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE};
pub use tcp::TcpTransport;

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// Reading half of an open device stream
pub type StreamReader = Box<dyn Read + Send>;

/// Writing half of an open device stream
pub type StreamWriter = Box<dyn Write + Send>;

/// Something that can open a fresh stream to a device.
///
/// A transport is a recipe, not a live connection: the connection layer calls
/// [`Transport::open`] every time it (re)connects.
pub trait Transport: Send + Sync {
    /// Open a new stream whose reads give up after `read_timeout`
    fn open(&self, read_timeout: Duration) -> Result<Stream>;

    /// Endpoint description used in logs and errors
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&self, read_timeout: Duration) -> Result<Stream> {
        (**self).open(read_timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// An open device stream split into reader, writer and shutdown hook
pub struct Stream {
    reader: StreamReader,
    writer: StreamWriter,
    shutdown: ShutdownHandle,
}

impl Stream {
    pub fn new(reader: StreamReader, writer: StreamWriter) -> Self {
        Self {
            reader,
            writer,
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Attach a hook that interrupts blocked reads when the stream is closed
    pub fn with_shutdown<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shutdown = ShutdownHandle(Some(Arc::new(hook)));
        self
    }

    pub fn into_parts(self) -> (StreamReader, StreamWriter, ShutdownHandle) {
        (self.reader, self.writer, self.shutdown)
    }
}

/// Cloneable hook that tears the underlying stream down
#[derive(Clone, Default)]
pub struct ShutdownHandle(Option<Arc<dyn Fn() + Send + Sync>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if let Some(hook) = &self.0 {
            hook();
        }
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShutdownHandle")
            .field(&self.0.is_some())
            .finish()
    }
}

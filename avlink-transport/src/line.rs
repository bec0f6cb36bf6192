//! Line framing over a timed-out byte stream

use std::io::{ErrorKind, Read};

use crate::error::{Result, TransportError};

const CHUNK_SIZE: usize = 512;

/// Longest line kept before the buffer is considered garbage
const MAX_LINE_LENGTH: usize = 4096;

/// Splits a byte stream into `\r` or `\n` terminated lines.
///
/// Bytes received before a read timeout are kept, so a line that arrives in
/// several pieces is still returned whole. Blank lines are skipped.
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Read the next non-empty line.
    ///
    /// Returns `Ok(None)` when the read timed out without completing a line,
    /// and [`TransportError::Closed`] when the peer closed the stream.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(line) = self.take_line() {
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    if self.buffer.len() > MAX_LINE_LENGTH && !self.has_terminator() {
                        tracing::warn!(
                            "Discarding {} bytes without line terminator",
                            self.buffer.len()
                        );
                        self.buffer.clear();
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn has_terminator(&self) -> bool {
        self.buffer.iter().any(|b| *b == b'\r' || *b == b'\n')
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\r' || *b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&raw[..end]).trim().to_string())
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

//! In-memory scripted device for tests
//!
//! [`ScriptedTransport`] plays the device side of a connection. Every line the
//! client writes is recorded and handed to an optional responder, whose
//! replies are queued for the client to read. Tests can also push unsolicited
//! notifications, drop the session, or make the device unreachable.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TransportError};
use crate::{Stream, Transport};

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct DeviceState {
    session: u64,
    session_open: bool,
    reachable: bool,
    open_count: usize,
    greeting: Option<String>,
    inbound: VecDeque<u8>,
    partial: Vec<u8>,
    written: Vec<String>,
    responder: Option<Responder>,
}

struct Shared {
    state: Mutex<DeviceState>,
    changed: Condvar,
}

/// A fake device reachable through the [`Transport`] trait
#[derive(Clone)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DeviceState {
                    reachable: true,
                    ..Default::default()
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Line sent to the client as soon as a session opens
    pub fn with_greeting(self, greeting: &str) -> Self {
        self.shared.state.lock().greeting = Some(greeting.to_string());
        self
    }

    /// Install a function that answers each written command
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        self.shared.state.lock().responder = Some(Box::new(responder));
    }

    /// Queue an unsolicited line for the client
    pub fn push_line(&self, line: &str) {
        let mut state = self.shared.state.lock();
        state.inbound.extend(line.as_bytes());
        state.inbound.extend(b"\r\n");
        self.shared.changed.notify_all();
    }

    /// Commands written by the client so far, without terminators
    pub fn written(&self) -> Vec<String> {
        self.shared.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.shared.state.lock().written.clear();
    }

    /// Block until at least `count` commands were written
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.written.len() < count {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return state.written.len() >= count;
            }
        }
        true
    }

    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }

    pub fn is_session_open(&self) -> bool {
        self.shared.state.lock().session_open
    }

    /// Close the current session from the device side
    pub fn drop_session(&self) {
        let mut state = self.shared.state.lock();
        state.session_open = false;
        state.inbound.clear();
        self.shared.changed.notify_all();
    }

    /// Refuse (or accept again) new sessions
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.state.lock().reachable = reachable;
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, read_timeout: Duration) -> Result<Stream> {
        let mut state = self.shared.state.lock();
        if !state.reachable {
            return Err(TransportError::Connect {
                target: self.describe(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "device unreachable"),
            });
        }

        state.session += 1;
        state.session_open = true;
        state.open_count += 1;
        state.inbound.clear();
        state.partial.clear();
        if let Some(greeting) = state.greeting.clone() {
            state.inbound.extend(greeting.as_bytes());
            state.inbound.extend(b"\r");
        }
        let session = state.session;
        drop(state);

        let reader = ScriptedReader {
            shared: Arc::clone(&self.shared),
            session,
            read_timeout,
        };
        let writer = ScriptedWriter {
            shared: Arc::clone(&self.shared),
            session,
        };
        let closer = Arc::clone(&self.shared);

        Ok(
            Stream::new(Box::new(reader), Box::new(writer)).with_shutdown(move || {
                let mut state = closer.state.lock();
                if state.session == session {
                    state.session_open = false;
                }
                closer.changed.notify_all();
            }),
        )
    }

    fn describe(&self) -> String {
        "scripted-device".to_string()
    }
}

fn is_live(state: &DeviceState, session: u64) -> bool {
    state.session == session && state.session_open
}

struct ScriptedReader {
    shared: Arc<Shared>,
    session: u64,
    read_timeout: Duration,
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + self.read_timeout;
        let mut state = self.shared.state.lock();
        loop {
            if !is_live(&state, self.session) {
                return Ok(0);
            }
            if !state.inbound.is_empty() {
                let n = buf.len().min(state.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
        }
    }
}

struct ScriptedWriter {
    shared: Arc<Shared>,
    session: u64,
}

impl Write for ScriptedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        if !is_live(&state, self.session) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed"));
        }

        for byte in buf {
            if *byte != b'\r' {
                state.partial.push(*byte);
                continue;
            }
            let line = String::from_utf8_lossy(&state.partial).to_string();
            state.partial.clear();
            let replies = match state.responder.as_mut() {
                Some(responder) => responder(&line),
                None => Vec::new(),
            };
            state.written.push(line);
            for reply in replies {
                state.inbound.extend(reply.as_bytes());
                state.inbound.extend(b"\r\n");
            }
        }
        self.shared.changed.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

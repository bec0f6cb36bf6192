//! Persistent device connection
//!
//! A [`Connection`] owns one stream at a time. Writes happen on the caller's
//! thread under a connection-wide lock; a reader thread parses every incoming
//! line and either hands it to the waiting sender or dispatches it as a
//! debounced notification on the scheduler.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use avlink_protocol::{Protocol, Reply, Request};
use avlink_transport::{LineReader, ShutdownHandle, StreamReader, StreamWriter, Transport};
use parking_lot::Mutex;

use crate::config::ConnectionConfig;
use crate::correlation::{CorrelationSlot, WaitOutcome};
use crate::error::{ConnectionError, Result};
use crate::health::HealthMonitor;
use crate::listener::{ConnectionListener, ListenerSet, NotificationListener};
use crate::notifier::Debouncer;
use crate::scheduler::Scheduler;

/// Lifecycle of the underlying stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

struct Link {
    state: ConnectionState,
    writer: Option<StreamWriter>,
    shutdown: ShutdownHandle,
    stop: Option<Arc<AtomicBool>>,
    /// Written in front of the next command, consumed once
    session_prefix: Option<String>,
    generation: u64,
}

impl Link {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            writer: None,
            shutdown: ShutdownHandle::default(),
            stop: None,
            session_prefix: None,
            generation: 0,
        }
    }

    fn teardown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Release);
        }
        std::mem::take(&mut self.shutdown).shutdown();
        self.writer = None;
        self.session_prefix = None;
        self.state = ConnectionState::Disconnected;
    }
}

type NotificationListeners<P> = ListenerSet<dyn NotificationListener<<P as Protocol>::Response>>;

struct Shared<P: Protocol> {
    protocol: P,
    transport: Box<dyn Transport>,
    endpoint: String,
    config: ConnectionConfig,
    scheduler: Scheduler,
    link: Mutex<Link>,
    connect_lock: Mutex<()>,
    send_lock: Mutex<()>,
    slot: CorrelationSlot<P::Kind, P::Response>,
    debouncer: Debouncer<P::Kind>,
    notification_listeners: NotificationListeners<P>,
    connection_listeners: ListenerSet<dyn ConnectionListener>,
    health: HealthMonitor,
    closed: AtomicBool,
}

/// A connection to one device speaking protocol `P`.
///
/// Cloning is cheap and every clone drives the same stream. The stream is
/// opened by [`Connection::connect`] or by the first send.
pub struct Connection<P: Protocol> {
    shared: Arc<Shared<P>>,
}

impl<P: Protocol> Clone for Connection<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Protocol> std::fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &self.shared.protocol.name())
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl<P: Protocol> Connection<P> {
    /// Create a disconnected connection
    pub fn new<T>(protocol: P, transport: T, config: ConnectionConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        config.validate()?;
        let endpoint = transport.describe();
        let scheduler = Scheduler::new(&format!("avlink-{}-scheduler", protocol.name()))?;

        Ok(Self {
            shared: Arc::new(Shared {
                endpoint,
                transport: Box::new(transport),
                scheduler,
                link: Mutex::new(Link::new()),
                connect_lock: Mutex::new(()),
                send_lock: Mutex::new(()),
                slot: CorrelationSlot::new(),
                debouncer: Debouncer::new(config.notification_delay),
                notification_listeners: ListenerSet::new(),
                connection_listeners: ListenerSet::new(),
                health: HealthMonitor::new(
                    config.health_check_initial_delay,
                    config.health_check_period,
                ),
                closed: AtomicBool::new(false),
                config,
                protocol,
            }),
        })
    }

    pub fn protocol(&self) -> &P {
        &self.shared.protocol
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Scheduler running this connection's callbacks
    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Open the stream if it is not open yet.
    ///
    /// On failure connection listeners receive a disconnection event carrying
    /// the same error.
    pub fn connect(&self) -> Result<()> {
        self.shared.connect()
    }

    /// Send a command, waiting for its reply when it expects one
    pub fn send(&self, command: &P::Command) -> Result<P::Response> {
        self.send_with(command, true)
    }

    /// Send a command.
    ///
    /// With `wait` false, or when the command expects no reply, the call
    /// returns as soon as the bytes are written with the protocol's
    /// no-response placeholder. Otherwise it blocks until the correlated
    /// reply arrives or the response timeout passes.
    pub fn send_with(&self, command: &P::Command, wait: bool) -> Result<P::Response> {
        self.shared.send(command, wait)
    }

    /// Close the stream and stop every background task.
    ///
    /// A sender waiting for a reply is released with a connection failure.
    /// The connection cannot be reopened.
    pub fn close(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.link.lock().teardown();
        shared.slot.abort();
        shared.debouncer.cancel_all();
        shared.health.stop();
        shared.scheduler.shutdown();
        tracing::info!(endpoint = %shared.endpoint, "Connection closed");
    }

    pub fn add_notification_listener(&self, listener: Arc<dyn NotificationListener<P::Response>>) {
        self.shared.notification_listeners.add(listener);
    }

    pub fn remove_notification_listener(
        &self,
        listener: &Arc<dyn NotificationListener<P::Response>>,
    ) -> bool {
        self.shared.notification_listeners.remove(listener)
    }

    pub fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.shared.connection_listeners.add(listener);
    }

    pub fn remove_connection_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.shared.connection_listeners.remove(listener)
    }

    /// Start the periodic health probe on this connection's scheduler.
    ///
    /// Returns `false` when a probe is already running.
    pub fn start_health_check<F>(&self, probe: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        if self.is_closed() {
            return false;
        }
        self.shared.health.start(&self.shared.scheduler, probe)
    }

    pub fn stop_health_check(&self) -> bool {
        self.shared.health.stop()
    }

    pub fn is_health_check_running(&self) -> bool {
        self.shared.health.is_running()
    }
}

impl<P: Protocol> Shared<P> {
    fn connect(self: &Arc<Self>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let _connecting = self.connect_lock.lock();
        {
            let mut link = self.link.lock();
            if link.state == ConnectionState::Connected {
                return Ok(());
            }
            link.state = ConnectionState::Connecting;
        }

        tracing::debug!(endpoint = %self.endpoint, "Opening {} session", self.protocol.name());
        match self.open_session() {
            Ok(()) => {
                tracing::info!(endpoint = %self.endpoint, "Connected");
                self.dispatch_connected();
                Ok(())
            }
            Err(e) => {
                self.link.lock().state = ConnectionState::Disconnected;
                tracing::warn!(endpoint = %self.endpoint, "Connection attempt failed: {}", e);
                self.dispatch_disconnected(e.clone());
                Err(e)
            }
        }
    }

    fn open_session(self: &Arc<Self>) -> Result<()> {
        let stream = self
            .transport
            .open(self.config.read_timeout)
            .map_err(|e| ConnectionError::from_transport(&self.endpoint, e))?;
        let (reader, writer, shutdown) = stream.into_parts();
        let mut lines = LineReader::new(reader);

        let session_prefix = if self.protocol.expects_greeting() {
            let handshake = self.read_greeting(&mut lines).and_then(|greeting| {
                tracing::debug!(endpoint = %self.endpoint, "<- {}", greeting);
                self.protocol
                    .greet(&greeting)
                    .map_err(|e| ConnectionError::from_handshake(&self.endpoint, e))
            });
            match handshake {
                Ok(prefix) => prefix,
                Err(e) => {
                    shutdown.shutdown();
                    return Err(e);
                }
            }
        } else {
            None
        };

        let stop = Arc::new(AtomicBool::new(false));
        let mut link = self.link.lock();
        let generation = link.generation + 1;

        let reader_shared = Arc::downgrade(self);
        let reader_stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name(format!("avlink-{}-reader", self.protocol.name()))
            .spawn(move || run_reader(reader_shared, lines, reader_stop, generation));
        if let Err(e) = spawned {
            shutdown.shutdown();
            return Err(ConnectionError::Thread(format!("reader: {e}")));
        }

        *link = Link {
            state: ConnectionState::Connected,
            writer: Some(writer),
            shutdown,
            stop: Some(stop),
            session_prefix,
            generation,
        };
        Ok(())
    }

    fn read_greeting(&self, lines: &mut LineReader<StreamReader>) -> Result<String> {
        let deadline = Instant::now() + self.config.connect_timeout;
        loop {
            match lines.read_line() {
                Ok(Some(line)) => return Ok(line),
                Ok(None) if Instant::now() < deadline => continue,
                Ok(None) => {
                    return Err(ConnectionError::failure(
                        &self.endpoint,
                        "No greeting received from device",
                    ))
                }
                Err(e) => return Err(ConnectionError::from_transport(&self.endpoint, e)),
            }
        }
    }

    fn send(self: &Arc<Self>, command: &P::Command, wait: bool) -> Result<P::Response> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let _sending = self.send_lock.lock();
        if self.link.lock().state != ConnectionState::Connected {
            self.connect()?;
        }

        let expected = if wait { command.expected() } else { None };
        if let Some(kind) = expected {
            self.slot.arm(kind, command.zone());
        }

        if let Err(e) = self.write(command) {
            self.slot.clear();
            return Err(e);
        }

        if expected.is_none() {
            return Ok(self.protocol.no_response(command));
        }

        match self.slot.wait(self.config.response_timeout) {
            WaitOutcome::Response(reply) if reply.is_auth_failure() => {
                tracing::error!(endpoint = %self.endpoint, "Device rejected authentication");
                Err(ConnectionError::AuthenticationFailure(format!(
                    "{} rejected the session credentials",
                    self.endpoint
                )))
            }
            WaitOutcome::Response(reply) => Ok(reply),
            WaitOutcome::TimedOut => {
                let command = command.wire().trim_end().to_string();
                tracing::debug!(
                    endpoint = %self.endpoint,
                    "Timed out waiting for reply to {}",
                    command
                );
                Err(ConnectionError::Timeout {
                    command,
                    timeout: self.config.response_timeout,
                })
            }
            WaitOutcome::Aborted => Err(ConnectionError::failure(
                &self.endpoint,
                "Stream closed while waiting for a reply",
            )),
        }
    }

    fn write(self: &Arc<Self>, command: &P::Command) -> Result<()> {
        let mut link = self.link.lock();
        let generation = link.generation;
        let prefix = link.session_prefix.take();
        let Some(writer) = link.writer.as_mut() else {
            return Err(ConnectionError::failure(&self.endpoint, "Not connected"));
        };

        let wire = match prefix {
            Some(prefix) => format!("{prefix}{}", command.wire()),
            None => command.wire(),
        };
        tracing::debug!(endpoint = %self.endpoint, "-> {}", wire.trim_end());

        let written = writer
            .write_all(wire.as_bytes())
            .and_then(|_| writer.flush());
        drop(link);

        written.map_err(|e| {
            let error = ConnectionError::failure(&self.endpoint, e);
            self.handle_failure(generation, error.clone());
            error
        })
    }

    /// Route a line read from the device
    fn dispatch_line(self: &Arc<Self>, line: &str) {
        let reply = match self.protocol.parse(line) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, "Dropping line {:?}: {}", line, e);
                return;
            }
        };
        tracing::debug!(endpoint = %self.endpoint, "<- {}", line);

        if let Err(notification) = self.slot.offer(reply) {
            if notification.is_auth_failure() {
                tracing::warn!(endpoint = %self.endpoint, "Unsolicited authentication error");
            }
            self.notify(notification);
        }
    }

    fn notify(self: &Arc<Self>, notification: P::Response) {
        // One pending delivery per response type, whatever the zone
        let key = notification.kind();
        let shared = Arc::downgrade(self);
        self.debouncer.submit(&self.scheduler, key, move || {
            if let Some(shared) = shared.upgrade() {
                for listener in shared.notification_listeners.snapshot() {
                    listener.on_notification(&notification);
                }
            }
        });
    }

    fn handle_failure(self: &Arc<Self>, generation: u64, cause: ConnectionError) {
        {
            let mut link = self.link.lock();
            if link.generation != generation || link.state != ConnectionState::Connected {
                return;
            }
            link.teardown();
        }
        tracing::error!(endpoint = %self.endpoint, "Connection lost: {}", cause);
        self.slot.abort();
        self.dispatch_disconnected(cause);
    }

    fn dispatch_connected(self: &Arc<Self>) {
        let shared = Arc::downgrade(self);
        self.scheduler.execute(move || {
            if let Some(shared) = shared.upgrade() {
                for listener in shared.connection_listeners.snapshot() {
                    listener.on_connected();
                }
            }
        });
    }

    fn dispatch_disconnected(self: &Arc<Self>, cause: ConnectionError) {
        let shared = Arc::downgrade(self);
        self.scheduler.execute(move || {
            if let Some(shared) = shared.upgrade() {
                for listener in shared.connection_listeners.snapshot() {
                    listener.on_disconnected(&cause);
                }
            }
        });
    }
}

impl<P: Protocol> Drop for Shared<P> {
    fn drop(&mut self) {
        self.link.get_mut().teardown();
        self.debouncer.cancel_all();
    }
}

fn run_reader<P: Protocol>(
    shared: Weak<Shared<P>>,
    mut lines: LineReader<StreamReader>,
    stop: Arc<AtomicBool>,
    generation: u64,
) {
    tracing::debug!("Reader started (session {})", generation);
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match lines.read_line() {
            Ok(None) => continue,
            Ok(Some(line)) => match shared.upgrade() {
                Some(shared) => shared.dispatch_line(&line),
                None => break,
            },
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    if let Some(shared) = shared.upgrade() {
                        let cause = ConnectionError::from_transport(&shared.endpoint, e);
                        shared.handle_failure(generation, cause);
                    }
                }
                break;
            }
        }
    }
    tracing::debug!("Reader stopped (session {})", generation);
}

/// Helper used by tests and callers that need to wait for a state
pub fn wait_for_state<P: Protocol>(
    connection: &Connection<P>,
    state: ConnectionState,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    while connection.state() != state {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use avlink_protocol::avr::{AvrProtocol, Command, CommandType, Response, ResponseType};
    use avlink_transport::mock::ScriptedTransport;
    use std::sync::mpsc;

    fn connection(transport: &ScriptedTransport) -> Connection<AvrProtocol> {
        Connection::new(AvrProtocol, transport.clone(), ConnectionConfig::fast()).unwrap()
    }

    #[test]
    fn test_send_connects_lazily() {
        let transport = ScriptedTransport::new();
        transport.respond_with(|line| match line {
            "?P" => vec!["PWR0".to_string()],
            _ => vec![],
        });
        let connection = connection(&transport);
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        let reply = connection
            .send(&Command::new(CommandType::PowerQuery, 1))
            .unwrap();
        assert!(reply.is_power_on());
        assert!(connection.is_connected());
        assert_eq!(transport.open_count(), 1);
    }

    #[test]
    fn test_command_without_reply_returns_placeholder() {
        let transport = ScriptedTransport::new();
        let connection = connection(&transport);

        let reply = connection
            .send(&Command::new(CommandType::PowerOff, 1))
            .unwrap();
        assert_eq!(reply.response_type(), ResponseType::None);
        assert_eq!(transport.written(), vec!["PF".to_string()]);
    }

    #[test]
    fn test_timeout_then_late_reply_is_notification() {
        let transport = ScriptedTransport::new();
        let connection = connection(&transport);
        let (tx, rx) = mpsc::channel();
        let sink = Mutex::new(tx);
        connection.add_notification_listener(Arc::new(move |reply: &Response| {
            let _ = sink.lock().send(reply.clone());
        }));

        let err = connection
            .send(&Command::new(CommandType::MuteQuery, 1))
            .unwrap_err();
        assert!(err.is_timeout());

        transport.push_line("MUT0");
        let notification = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(notification.is_muted());
    }

    #[test]
    fn test_unparseable_lines_are_dropped() {
        let transport = ScriptedTransport::new();
        transport.respond_with(|line| match line {
            "?V" => vec!["GARBAGE".to_string(), "VOL093".to_string()],
            _ => vec![],
        });
        let connection = connection(&transport);
        let reply = connection
            .send(&Command::new(CommandType::VolumeQuery, 1))
            .unwrap();
        assert_eq!(reply.parameter(), Some("093"));
    }

    #[test]
    fn test_close_releases_and_rejects() {
        let transport = ScriptedTransport::new();
        let connection = connection(&transport);
        connection.connect().unwrap();
        assert!(transport.is_session_open());

        connection.close();
        assert!(connection.is_closed());
        assert!(!transport.is_session_open());
        assert_eq!(
            connection.send(&Command::new(CommandType::PowerQuery, 1)),
            Err(ConnectionError::Closed)
        );
        assert_eq!(connection.connect(), Err(ConnectionError::Closed));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ConnectionConfig::fast().with_response_timeout(Duration::ZERO);
        let result = Connection::new(AvrProtocol, ScriptedTransport::new(), config);
        assert!(matches!(result, Err(ConnectionError::Configuration(_))));
    }

    #[test]
    fn test_wait_for_state() {
        let transport = ScriptedTransport::new();
        let connection = connection(&transport);
        connection.connect().unwrap();
        transport.drop_session();
        assert!(wait_for_state(
            &connection,
            ConnectionState::Disconnected,
            Duration::from_secs(1)
        ));
    }
}

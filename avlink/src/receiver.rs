//! Receiver - control surface of one Pioneer-style AV receiver
//!
//! Translates channel intents into receiver commands, interprets replies and
//! notifications into [`StateUpdate`]s, and keeps the device online with a
//! periodic status probe while it is unreachable.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use avlink_connection::{
    BurstSender, BurstSettings, Connection, ConnectionConfig, ConnectionError, ConnectionListener,
    ListenerSet, NotificationListener,
};
use avlink_protocol::avr::{
    decode_display_information, AvrProtocol, Command, CommandType, Response, ResponseType,
};
use avlink_protocol::{ModelProperties, ProtocolError, VolumeConverter};
use avlink_transport::Transport;
use parking_lot::Mutex;

use crate::channel::{ChannelKind, CommandValue, DeviceStatus, StateUpdate, StateValue};
use crate::config::ReceiverConfig;
use crate::error::{DeviceError, Result};
use crate::listener::DeviceListener;

/// Pause between the wake-up and the actual power-on command
const POWER_ON_DELAY: Duration = Duration::from_millis(100);

/// Zone the display and the status check are bound to
const MAIN_ZONE: u8 = 1;

/// Handle to one receiver.
///
/// Cloning is cheap; clones share the connection and listeners.
///
/// # Example
///
/// ```rust,ignore
/// use avlink::{ChannelKind, CommandValue, Receiver, ReceiverConfig};
///
/// let config = ReceiverConfig::from_file("receiver.json")?;
/// let receiver = Receiver::new(&config)?;
/// receiver.add_listener(std::sync::Arc::new(|update: &avlink::StateUpdate| {
///     println!("{update}");
/// }));
/// receiver.initialize();
/// receiver.handle_command(ChannelKind::VolumePercent, 1, CommandValue::Percent(40.0))?;
/// ```
#[derive(Clone)]
pub struct Receiver {
    inner: Arc<Inner>,
}

struct Inner {
    connection: Connection<AvrProtocol>,
    model: ModelProperties,
    converter: VolumeConverter,
    burst: BurstSender,
    listeners: ListenerSet<dyn DeviceListener>,
    status: Mutex<DeviceStatus>,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("model", &self.inner.model.model_name())
            .field("endpoint", &self.inner.connection.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

impl Receiver {
    /// Create a receiver from its configuration with default connection timings
    pub fn new(config: &ReceiverConfig) -> Result<Self> {
        Self::with_connection_config(config, ConnectionConfig::default())
    }

    pub fn with_connection_config(
        config: &ReceiverConfig,
        connection_config: ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_transport(
            config.model_properties()?,
            config.endpoint.transport(),
            connection_config,
        )
    }

    /// Create a receiver over an arbitrary transport
    pub fn with_transport<T>(
        model: ModelProperties,
        transport: T,
        connection_config: ConnectionConfig,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let connection = Connection::new(AvrProtocol, transport, connection_config)?;
        let burst = if model.is_burst_mode_enabled() {
            BurstSettings::enabled(model.burst_delay())
        } else {
            BurstSettings::default()
        };

        let inner = Arc::new(Inner {
            converter: VolumeConverter::new(&model),
            burst: BurstSender::new(burst),
            connection,
            model,
            listeners: ListenerSet::new(),
            status: Mutex::new(DeviceStatus::Unknown),
        });

        let events = Arc::new(Events {
            inner: Arc::downgrade(&inner),
        });
        let listener: Arc<dyn NotificationListener<Response>> = events.clone();
        inner.connection.add_notification_listener(listener);
        inner
            .connection
            .add_connection_listener(events as Arc<dyn ConnectionListener>);

        tracing::debug!(
            "Created receiver {} ({} zones) at {}",
            inner.model.model_name(),
            inner.model.nb_zones(),
            inner.connection.endpoint()
        );
        Ok(Self { inner })
    }

    pub fn model(&self) -> &ModelProperties {
        &self.inner.model
    }

    pub fn connection(&self) -> &Connection<AvrProtocol> {
        &self.inner.connection
    }

    pub fn status(&self) -> DeviceStatus {
        *self.inner.status.lock()
    }

    pub fn add_listener(&self, listener: Arc<dyn DeviceListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DeviceListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Bring the receiver online.
    ///
    /// Runs a status check; an unreachable device is marked offline and
    /// probed periodically until it answers.
    pub fn initialize(&self) {
        self.inner.check_status();
    }

    /// Query the main zone power state to find out whether the device is reachable
    pub fn check_status(&self) {
        self.inner.check_status();
    }

    /// Query the power state of every zone of the model
    pub fn update_zones(&self) {
        self.inner.update_zones();
    }

    /// Apply `value` to `channel` of `zone`.
    ///
    /// Intents for zones the model does not have are dropped with a warning.
    /// Replies are interpreted and reported to listeners like notifications.
    pub fn handle_command(
        &self,
        channel: ChannelKind,
        zone: u8,
        value: CommandValue,
    ) -> Result<()> {
        self.inner.handle_command(channel, zone, value)
    }

    /// Shorthand for a refresh of one channel
    pub fn refresh(&self, channel: ChannelKind, zone: u8) -> Result<()> {
        self.handle_command(channel, zone, CommandValue::Refresh)
    }

    /// Close the connection for good
    pub fn close(&self) {
        tracing::info!("Closing receiver at {}", self.inner.connection.endpoint());
        self.inner.connection.close();
    }
}

// ============================================================================
// Command handling
// ============================================================================

impl Inner {
    fn handle_command(
        self: &Arc<Self>,
        channel: ChannelKind,
        zone: u8,
        value: CommandValue,
    ) -> Result<()> {
        // The display is not bound to a zone
        if channel == ChannelKind::DisplayInformation {
            return match value {
                CommandValue::Refresh => {
                    let response = self.send(CommandType::DisplayQuery, MAIN_ZONE)?;
                    self.interpret(&response);
                    Ok(())
                }
                value => Err(self.unsupported(channel, value)),
            };
        }

        if !self.model.is_zone_supported(zone) {
            tracing::warn!(
                "Command for zone {} not sent, {} supports zones 1..={}",
                zone,
                self.model.model_name(),
                self.model.nb_zones()
            );
            return Ok(());
        }

        let response = match channel {
            ChannelKind::Power => self.power_command(zone, value)?,
            ChannelKind::VolumeDb | ChannelKind::VolumePercent => {
                self.volume_command(channel, zone, value)?
            }
            ChannelKind::InputSource => self.input_command(zone, value)?,
            ChannelKind::Mute => self.mute_command(channel, zone, value)?,
            _ => return Err(self.unsupported(channel, value)),
        };
        if let Some(response) = response {
            self.interpret(&response);
        }
        Ok(())
    }

    fn power_command(&self, zone: u8, value: CommandValue) -> Result<Option<Response>> {
        match value {
            CommandValue::On => {
                // The first command only wakes the receiver up
                self.send_no_wait(CommandType::PowerOn, zone)?;
                thread::sleep(POWER_ON_DELAY);
                self.send_no_wait(CommandType::PowerOn, zone)?;
                Ok(None)
            }
            CommandValue::Off => {
                self.send_no_wait(CommandType::PowerOff, zone)?;
                Ok(None)
            }
            CommandValue::Refresh => self.send(CommandType::PowerQuery, zone).map(Some),
            value => Err(self.unsupported(ChannelKind::Power, value)),
        }
    }

    fn volume_command(
        &self,
        channel: ChannelKind,
        zone: u8,
        value: CommandValue,
    ) -> Result<Option<Response>> {
        let db_enabled = self.has_channel(ChannelKind::VolumeDb);
        if !self.has_channel(channel) {
            return Err(self.unsupported(channel, value));
        }
        match value {
            // On/off on a volume channel acts on mute
            CommandValue::On | CommandValue::Off => self.mute_command(channel, zone, value),
            CommandValue::Increase => self.send(CommandType::VolumeUp, zone).map(Some),
            CommandValue::Decrease => self.send(CommandType::VolumeDown, zone).map(Some),
            CommandValue::Percent(percent) => {
                tracing::debug!("Set zone {} volume to {} %", zone, percent);
                self.set_volume(self.converter.percent_to_native(percent, zone), zone)
            }
            CommandValue::Decibel(db) if db_enabled => {
                tracing::debug!("Set zone {} volume to {} dB", zone, db);
                self.set_volume(self.converter.db_to_native(db, zone), zone)
            }
            CommandValue::Refresh => self.send(CommandType::VolumeQuery, zone).map(Some),
            value => Err(self.unsupported(channel, value)),
        }
    }

    /// Reach a native volume with the set command, or by stepping when the
    /// model has no usable set command
    fn set_volume(&self, native: u32, zone: u8) -> Result<Option<Response>> {
        if self.model.is_set_volume_enabled() {
            let parameter = self.converter.format_native(native, zone);
            let command = Command::with_parameter(CommandType::VolumeSet, zone, parameter)?;
            return Ok(Some(self.connection.send(&command)?));
        }

        let mut current = None;
        let delta = self.burst.ramp(
            &self.connection,
            &Command::new(CommandType::VolumeQuery, zone),
            &Command::new(CommandType::VolumeUp, zone),
            &Command::new(CommandType::VolumeDown, zone),
            i64::from(native),
            |reply| {
                current = Some(reply.clone());
                let value = reply
                    .parameter()
                    .filter(|_| reply.response_type() == ResponseType::VolumeLevel)
                    .ok_or_else(|| ProtocolError::UnexpectedValue {
                        field: "volume level",
                        value: format!("{:?}", reply.response_type()),
                    })?;
                Ok(i64::from(self.converter.parse_native(value)?))
            },
        )?;
        tracing::debug!("Stepped zone {} volume by {}", zone, delta);
        Ok(current)
    }

    fn input_command(&self, zone: u8, value: CommandValue) -> Result<Option<Response>> {
        let command_type = match value {
            CommandValue::Increase => CommandType::InputChangeCyclic,
            CommandValue::Decrease => CommandType::InputChangeReverse,
            CommandValue::Text(text) => {
                let Some(source) = self.model.find_input_source(zone, &text) else {
                    let value = CommandValue::Text(text);
                    return Err(self.unsupported(ChannelKind::InputSource, value));
                };
                tracing::debug!("Select {} ({}) on zone {}", source.name, source.code, zone);
                let command =
                    Command::with_parameter(CommandType::InputChannelSet, zone, source.code)?;
                return Ok(Some(self.connection.send(&command)?));
            }
            CommandValue::Refresh => CommandType::InputQuery,
            value => return Err(self.unsupported(ChannelKind::InputSource, value)),
        };
        if !command_type.supports_zone(zone) {
            return Err(self.unsupported(ChannelKind::InputSource, value));
        }
        self.send(command_type, zone).map(Some)
    }

    fn mute_command(
        &self,
        channel: ChannelKind,
        zone: u8,
        value: CommandValue,
    ) -> Result<Option<Response>> {
        let command_type = match value {
            CommandValue::On => CommandType::MuteOn,
            CommandValue::Off => CommandType::MuteOff,
            CommandValue::Refresh => CommandType::MuteQuery,
            value => return Err(self.unsupported(channel, value)),
        };
        self.send(command_type, zone).map(Some)
    }

    fn send(&self, command_type: CommandType, zone: u8) -> Result<Response> {
        Ok(self.connection.send(&Command::new(command_type, zone))?)
    }

    fn send_no_wait(&self, command_type: CommandType, zone: u8) -> Result<Response> {
        Ok(self
            .connection
            .send_with(&Command::new(command_type, zone), false)?)
    }

    /// Models without dB channels only report and accept volume in percent
    fn has_channel(&self, channel: ChannelKind) -> bool {
        channel != ChannelKind::VolumeDb || self.model.are_db_channels_enabled()
    }

    fn unsupported(&self, channel: ChannelKind, value: CommandValue) -> DeviceError {
        tracing::info!("Unsupported command {} received for channel {}", value, channel);
        DeviceError::CommandNotSupported { channel, value }
    }
}

// ============================================================================
// Status and zone synchronisation
// ============================================================================

impl Inner {
    fn check_status(self: &Arc<Self>) {
        tracing::debug!("Checking status of receiver at {}", self.connection.endpoint());
        match self.send(CommandType::PowerQuery, MAIN_ZONE) {
            // The connection listener already brought the device online
            Ok(response) => self.interpret(&response),
            Err(DeviceError::Timeout(reason)) => {
                tracing::debug!("Timeout during status check: {}", reason);
            }
            Err(e) => {
                self.set_status(DeviceStatus::Offline, Some(&e.to_string()));
                self.start_connection_checker();
            }
        }
    }

    fn update_zones(self: &Arc<Self>) {
        for zone in 1..=self.model.nb_zones() {
            match self.send(CommandType::PowerQuery, zone) {
                Ok(response) => self.interpret(&response),
                Err(e) => tracing::error!("Failed to update zone {}: {}", zone, e),
            }
        }
    }

    fn start_connection_checker(self: &Arc<Self>) {
        let inner = Arc::downgrade(self);
        self.connection.start_health_check(move || {
            if let Some(inner) = inner.upgrade() {
                inner.check_status();
            }
        });
    }

    fn on_connected(self: &Arc<Self>) {
        tracing::info!("Receiver at {} is connected", self.connection.endpoint());
        self.set_status(DeviceStatus::Online, None);
        self.connection.stop_health_check();
        self.update_zones();

        match self.send(CommandType::DisplayQuery, MAIN_ZONE) {
            Ok(response) => self.interpret(&response),
            Err(e) => {
                // The receiver is not required to answer a display query
                tracing::debug!("Display not updated after connection: {}", e);
                self.emit(StateUpdate::new(
                    ChannelKind::DisplayInformation,
                    MAIN_ZONE,
                    StateValue::Text(String::new()),
                ));
            }
        }
    }

    fn on_disconnected(self: &Arc<Self>, cause: &ConnectionError) {
        tracing::warn!("Receiver at {} is disconnected: {}", self.connection.endpoint(), cause);
        self.set_status(DeviceStatus::Offline, Some(&cause.to_string()));
        if !self.connection.is_closed() {
            self.start_connection_checker();
        }
    }

    fn set_status(&self, status: DeviceStatus, detail: Option<&str>) {
        {
            let mut current = self.status.lock();
            if *current == status {
                return;
            }
            *current = status;
        }

        let detail = detail.map(str::to_string);
        let listeners = self.listeners.snapshot();
        self.connection.scheduler().execute(move || {
            for listener in listeners {
                listener.status_changed(status, detail.as_deref());
            }
        });
    }
}

// ============================================================================
// Reply interpretation
// ============================================================================

impl Inner {
    /// Turn a reply or notification into state updates
    fn interpret(self: &Arc<Self>, response: &Response) {
        let zone = response.zone();
        let parameter = response.parameter().unwrap_or_default();

        match response.response_type() {
            ResponseType::PowerState => {
                let on = response.is_power_on();
                if on {
                    self.on_power_on(zone);
                } else {
                    self.on_power_off(zone);
                }
                self.emit(StateUpdate::new(ChannelKind::Power, zone, StateValue::OnOff(on)));
            }
            ResponseType::VolumeLevel => {
                if !self.model.is_zone_supported(zone) {
                    tracing::debug!("Volume of unsupported zone {} discarded", zone);
                    return;
                }
                match (
                    self.converter.wire_to_db(parameter, zone),
                    self.converter.wire_to_percent(parameter, zone),
                ) {
                    (Ok(db), Ok(percent)) => {
                        if self.has_channel(ChannelKind::VolumeDb) {
                            self.emit(StateUpdate::new(
                                ChannelKind::VolumeDb,
                                zone,
                                StateValue::Decibel(db),
                            ));
                        }
                        self.emit(StateUpdate::new(
                            ChannelKind::VolumePercent,
                            zone,
                            StateValue::Percent(percent.trunc()),
                        ));
                    }
                    (Err(e), _) | (_, Err(e)) => tracing::debug!("Volume discarded: {}", e),
                }
            }
            ResponseType::MuteState => {
                self.emit(StateUpdate::new(
                    ChannelKind::Mute,
                    zone,
                    StateValue::OnOff(response.is_muted()),
                ));
            }
            ResponseType::InputSourceChannel => {
                self.emit(StateUpdate::new(
                    ChannelKind::InputSource,
                    zone,
                    StateValue::Text(parameter.to_string()),
                ));
            }
            ResponseType::DisplayInformation => match decode_display_information(parameter) {
                Ok(text) => self.emit(StateUpdate::new(
                    ChannelKind::DisplayInformation,
                    zone,
                    StateValue::Text(text),
                )),
                Err(e) => tracing::debug!("Display information discarded: {}", e),
            },
            ResponseType::None => {}
            error => tracing::debug!("Receiver answered {:?} on zone {}", error, zone),
        }
    }

    /// Read back what a freshly powered zone is set to
    fn on_power_on(self: &Arc<Self>, zone: u8) {
        if !self.model.is_zone_supported(zone) {
            return;
        }
        for command_type in [
            CommandType::VolumeQuery,
            CommandType::MuteQuery,
            CommandType::InputQuery,
        ] {
            match self.send(command_type, zone) {
                Ok(response) => self.interpret(&response),
                Err(e) => {
                    tracing::error!("Failed to update zone {} after power on: {}", zone, e);
                    return;
                }
            }
        }
    }

    fn on_power_off(&self, zone: u8) {
        for channel in ChannelKind::ALL
            .into_iter()
            .filter(|channel| channel.resets_on_power_off() && self.has_channel(*channel))
        {
            self.emit(StateUpdate::new(channel, zone, StateValue::Undefined));
        }
    }

    /// Deliver an update to every listener on the scheduler thread
    fn emit(&self, update: StateUpdate) {
        tracing::debug!("{}", update);
        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        self.connection.scheduler().execute(move || {
            for listener in listeners {
                listener.state_changed(&update);
            }
        });
    }
}

/// Forwards connection events to the receiver without keeping it alive
struct Events {
    inner: Weak<Inner>,
}

impl NotificationListener<Response> for Events {
    fn on_notification(&self, notification: &Response) {
        if let Some(inner) = self.inner.upgrade() {
            inner.interpret(notification);
        }
    }
}

impl ConnectionListener for Events {
    fn on_connected(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_connected();
        }
    }

    fn on_disconnected(&self, cause: &ConnectionError) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_disconnected(cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avlink_transport::mock::ScriptedTransport;

    fn receiver(model: ModelProperties) -> (Receiver, ScriptedTransport) {
        let transport = ScriptedTransport::new();
        let receiver =
            Receiver::with_transport(model, transport.clone(), ConnectionConfig::fast()).unwrap();
        (receiver, transport)
    }

    #[test]
    fn test_starts_with_unknown_status() {
        let (receiver, _transport) = receiver(ModelProperties::vsx_1120());
        assert_eq!(receiver.status(), DeviceStatus::Unknown);
        assert_eq!(receiver.model().nb_zones(), 2);
        assert!(format!("{receiver:?}").contains("VSX-1120"));
    }

    #[test]
    fn test_unsupported_zone_sends_nothing() {
        let (receiver, transport) = receiver(ModelProperties::vsx_1120());
        receiver
            .handle_command(ChannelKind::Power, 3, CommandValue::On)
            .unwrap();
        receiver
            .handle_command(ChannelKind::Mute, 0, CommandValue::On)
            .unwrap();
        assert!(transport.written().is_empty());
        assert_eq!(transport.open_count(), 0);
    }

    #[test]
    fn test_unsupported_values_are_rejected_locally() {
        let (receiver, transport) = receiver(ModelProperties::vsx_1120());
        let err = receiver
            .handle_command(ChannelKind::Power, 1, CommandValue::Percent(10.0))
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandNotSupported { channel: ChannelKind::Power, .. }));

        let err = receiver
            .handle_command(ChannelKind::DisplayInformation, 1, CommandValue::On)
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandNotSupported { .. }));

        let err = receiver
            .handle_command(ChannelKind::AudioMute, 1, CommandValue::On)
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandNotSupported { .. }));

        // Cyclic input change only exists on the main zone
        let err = receiver
            .handle_command(ChannelKind::InputSource, 2, CommandValue::Increase)
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandNotSupported { .. }));

        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_unknown_input_source_is_rejected_locally() {
        let (receiver, transport) = receiver(ModelProperties::vsx_1120());
        let err = receiver
            .handle_command(ChannelKind::InputSource, 1, CommandValue::Text("GAME".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::CommandNotSupported { channel: ChannelKind::InputSource, .. }
        ));
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_db_channel_rejected_without_db_channels() {
        let (receiver, transport) = receiver(ModelProperties::configurable());
        let err = receiver
            .handle_command(ChannelKind::VolumeDb, 1, CommandValue::Refresh)
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::CommandNotSupported { channel: ChannelKind::VolumeDb, .. }
        ));

        let err = receiver
            .handle_command(ChannelKind::VolumePercent, 1, CommandValue::Decibel(-40.0))
            .unwrap_err();
        assert!(matches!(err, DeviceError::CommandNotSupported { .. }));
        assert!(transport.written().is_empty());
    }
}

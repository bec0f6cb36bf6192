//! Projector - PJLink class 1 device control
//!
//! Power, input selection and audio/video mute are exposed as channels of
//! zone 1. Identification, lamp and error status are read on demand. When
//! refreshing is configured, the selected channels are polled periodically
//! on the connection's scheduler.

use std::sync::{Arc, Weak};
use std::time::Duration;

use avlink_connection::{
    Connection, ConnectionConfig, ConnectionError, ConnectionListener, ListenerSet,
    NotificationListener, TaskHandle,
};
use avlink_protocol::pjlink::{
    ErrorStatus, Input, LampStatus, MuteTarget, PjLinkCommand, PjLinkProtocol, PjLinkRequest,
    PjLinkResponse, PowerState,
};
use avlink_transport::Transport;
use parking_lot::Mutex;
use serde::Serialize;

use crate::channel::{ChannelKind, CommandValue, DeviceStatus, StateUpdate, StateValue};
use crate::config::ProjectorConfig;
use crate::error::{DeviceError, Result};
use crate::listener::DeviceListener;

/// PJLink devices have a single zone
const ZONE: u8 = 1;

/// Identification strings of a projector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProjectorInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    /// PJLink class, `1` or `2`
    pub class: String,
    pub other_information: String,
}

/// Handle to one PJLink projector.
///
/// Cloning is cheap; clones share the connection, listeners and refresh task.
#[derive(Clone)]
pub struct Projector {
    inner: Arc<Inner>,
}

struct Inner {
    connection: Connection<PjLinkProtocol>,
    config: ProjectorConfig,
    listeners: ListenerSet<dyn DeviceListener>,
    status: Mutex<DeviceStatus>,
    refresh_task: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("endpoint", &self.inner.connection.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

impl Projector {
    pub fn new(config: &ProjectorConfig) -> Result<Self> {
        Self::with_transport(config, config.transport(), ConnectionConfig::default())
    }

    /// Create a projector over an arbitrary transport
    pub fn with_transport<T>(
        config: &ProjectorConfig,
        transport: T,
        connection_config: ConnectionConfig,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        config.validate()?;
        let protocol = PjLinkProtocol::new(config.password.clone());
        let connection = Connection::new(protocol, transport, connection_config)?;

        let inner = Arc::new(Inner {
            connection,
            config: config.clone(),
            listeners: ListenerSet::new(),
            status: Mutex::new(DeviceStatus::Unknown),
            refresh_task: Mutex::new(None),
        });

        let events = Arc::new(Events {
            inner: Arc::downgrade(&inner),
        });
        inner.connection.add_notification_listener(
            Arc::clone(&events) as Arc<dyn NotificationListener<PjLinkResponse>>
        );
        inner
            .connection
            .add_connection_listener(events as Arc<dyn ConnectionListener>);

        Ok(Self { inner })
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.inner.config
    }

    pub fn connection(&self) -> &Connection<PjLinkProtocol> {
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

    /// Connect, read the configured channels once and start polling them
    pub fn initialize(&self) -> Result<()> {
        let connected = self.inner.connection.connect();
        if let Err(e) = connected {
            let error = DeviceError::from(e);
            self.inner.set_status(DeviceStatus::Offline, Some(&error.to_string()));
            self.inner.start_connection_checker();
            self.start_refresh();
            return Err(error);
        }
        self.inner.refresh_configured();
        self.start_refresh();
        Ok(())
    }

    /// Start the periodic refresh; returns `false` when it is disabled or already running
    pub fn start_refresh(&self) -> bool {
        self.inner.start_refresh()
    }

    pub fn stop_refresh(&self) -> bool {
        match self.inner.refresh_task.lock().take() {
            Some(task) => task.cancel(),
            None => false,
        }
    }

    /// Apply `value` to one of the projector channels
    pub fn handle_command(&self, channel: ChannelKind, value: CommandValue) -> Result<()> {
        self.inner.handle_command(channel, value)
    }

    pub fn refresh(&self, channel: ChannelKind) -> Result<()> {
        self.handle_command(channel, CommandValue::Refresh)
    }

    pub fn power_state(&self) -> Result<PowerState> {
        let response = self.inner.query(PjLinkCommand::Power)?;
        Ok(response.power_state()?)
    }

    /// Inputs the projector offers
    pub fn inputs(&self) -> Result<Vec<Input>> {
        let response = self.inner.query(PjLinkCommand::InputList)?;
        Ok(response.input_list()?)
    }

    pub fn lamps(&self) -> Result<Vec<LampStatus>> {
        let response = self.inner.query(PjLinkCommand::Lamp)?;
        Ok(response.lamps()?)
    }

    pub fn error_status(&self) -> Result<ErrorStatus> {
        let response = self.inner.query(PjLinkCommand::ErrorStatus)?;
        Ok(response.error_status()?)
    }

    /// Read name, manufacturer, model, class and other information
    pub fn identify(&self) -> Result<ProjectorInfo> {
        let text = |command| -> Result<String> {
            let response = self.inner.query(command)?;
            Ok(response.text()?.to_string())
        };
        Ok(ProjectorInfo {
            name: text(PjLinkCommand::Name)?,
            manufacturer: text(PjLinkCommand::Manufacturer)?,
            model: text(PjLinkCommand::Model)?,
            class: text(PjLinkCommand::Class)?,
            other_information: text(PjLinkCommand::OtherInformation)?,
        })
    }

    /// Stop polling and close the connection for good
    pub fn close(&self) {
        tracing::info!("Closing projector at {}", self.inner.connection.endpoint());
        self.stop_refresh();
        self.inner.connection.close();
    }
}

impl Inner {
    fn handle_command(self: &Arc<Self>, channel: ChannelKind, value: CommandValue) -> Result<()> {
        match (channel, &value) {
            (ChannelKind::Power, CommandValue::On | CommandValue::Off) => {
                let on = value == CommandValue::On;
                self.set(PjLinkRequest::power(on))?;
                self.emit(ChannelKind::Power, StateValue::OnOff(on));
                Ok(())
            }
            (ChannelKind::Power, CommandValue::Refresh) => self.refresh_power(),

            (ChannelKind::InputSource, CommandValue::Text(code)) => {
                let input = Input::from_code(code)?;
                self.set(PjLinkRequest::select_input(input))?;
                self.emit(ChannelKind::InputSource, StateValue::Text(input.code()));
                Ok(())
            }
            (ChannelKind::InputSource, CommandValue::Refresh) => self.refresh_input(),

            (
                ChannelKind::AudioMute | ChannelKind::VideoMute | ChannelKind::Mute,
                CommandValue::On | CommandValue::Off,
            ) => {
                let muted = value == CommandValue::On;
                let target = match channel {
                    ChannelKind::AudioMute => MuteTarget::Audio,
                    ChannelKind::VideoMute => MuteTarget::Video,
                    _ => MuteTarget::AudioAndVideo,
                };
                self.set(PjLinkRequest::mute(target, muted))?;
                if target != MuteTarget::Video {
                    self.emit(ChannelKind::AudioMute, StateValue::OnOff(muted));
                }
                if target != MuteTarget::Audio {
                    self.emit(ChannelKind::VideoMute, StateValue::OnOff(muted));
                }
                Ok(())
            }
            (
                ChannelKind::AudioMute | ChannelKind::VideoMute | ChannelKind::Mute,
                CommandValue::Refresh,
            ) => self.refresh_mute(),

            _ => {
                tracing::info!("Unsupported command {} received for channel {}", value, channel);
                Err(DeviceError::CommandNotSupported {
                    channel,
                    value: value.clone(),
                })
            }
        }
    }

    /// Send a set command and require an acknowledgement
    fn set(&self, request: PjLinkRequest) -> Result<()> {
        let response = self.connection.send(&request)?;
        check(&response)
    }

    fn query(&self, command: PjLinkCommand) -> Result<PjLinkResponse> {
        let response = self.connection.send(&PjLinkRequest::query(command))?;
        check(&response)?;
        Ok(response)
    }

    fn refresh_power(&self) -> Result<()> {
        let state = self.query(PjLinkCommand::Power)?.power_state()?;
        self.emit(ChannelKind::Power, StateValue::OnOff(state.is_on()));
        Ok(())
    }

    fn refresh_input(&self) -> Result<()> {
        let input = self.query(PjLinkCommand::Input)?.input()?;
        self.emit(ChannelKind::InputSource, StateValue::Text(input.code()));
        Ok(())
    }

    fn refresh_mute(&self) -> Result<()> {
        let mute = self.query(PjLinkCommand::AvMute)?.mute_state()?;
        self.emit(ChannelKind::AudioMute, StateValue::OnOff(mute.audio));
        self.emit(ChannelKind::VideoMute, StateValue::OnOff(mute.video));
        Ok(())
    }

    /// Read every channel selected for polling
    fn refresh_configured(&self) {
        let config = &self.config;
        let refreshes: [(bool, &str, fn(&Self) -> Result<()>); 3] = [
            (config.refresh_power, "power", Self::refresh_power),
            (config.refresh_mute, "mute", Self::refresh_mute),
            (config.refresh_input, "input", Self::refresh_input),
        ];
        for (_, name, refresh) in refreshes.iter().filter(|(enabled, _, _)| *enabled) {
            if let Err(e) = refresh(self) {
                tracing::warn!("Failed to refresh projector {}: {}", name, e);
                if e.is_offline() {
                    return;
                }
            }
        }
    }

    fn start_refresh(self: &Arc<Self>) -> bool {
        if !self.config.is_refresh_enabled() || self.connection.is_closed() {
            return false;
        }
        let mut task = self.refresh_task.lock();
        if task
            .as_ref()
            .is_some_and(|task| !task.is_cancelled() && !task.is_finished())
        {
            return false;
        }

        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        tracing::debug!("Refreshing projector every {:?}", interval);
        let inner = Arc::downgrade(self);
        *task = Some(
            self.connection
                .scheduler()
                .schedule_with_fixed_delay(interval, interval, move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.refresh_configured();
                    }
                }),
        );
        true
    }

    fn start_connection_checker(self: &Arc<Self>) {
        let inner = Arc::downgrade(self);
        self.connection.start_health_check(move || {
            if let Some(inner) = inner.upgrade() {
                if let Err(e) = inner.refresh_power() {
                    tracing::debug!("Projector still unreachable: {}", e);
                }
            }
        });
    }

    fn on_connected(&self) {
        tracing::info!("Projector at {} is connected", self.connection.endpoint());
        self.set_status(DeviceStatus::Online, None);
        self.connection.stop_health_check();
    }

    fn on_disconnected(self: &Arc<Self>, cause: &ConnectionError) {
        tracing::warn!("Projector at {} is disconnected: {}", self.connection.endpoint(), cause);
        self.set_status(DeviceStatus::Offline, Some(&cause.to_string()));
        if !self.connection.is_closed() {
            self.start_connection_checker();
        }
    }

    /// Unsolicited lines, e.g. a reply that arrived after its timeout
    fn interpret(&self, response: &PjLinkResponse) {
        let interpreted = match response.command() {
            PjLinkCommand::Power => response
                .power_state()
                .map(|state| self.emit(ChannelKind::Power, StateValue::OnOff(state.is_on()))),
            PjLinkCommand::Input => response
                .input()
                .map(|input| self.emit(ChannelKind::InputSource, StateValue::Text(input.code()))),
            PjLinkCommand::AvMute => response.mute_state().map(|mute| {
                self.emit(ChannelKind::AudioMute, StateValue::OnOff(mute.audio));
                self.emit(ChannelKind::VideoMute, StateValue::OnOff(mute.video));
            }),
            _ => Ok(()),
        };
        if let Err(e) = interpreted {
            tracing::debug!("Projector line {:?} discarded: {}", response, e);
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

    fn emit(&self, channel: ChannelKind, value: StateValue) {
        let update = StateUpdate::new(channel, ZONE, value);
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

fn check(response: &PjLinkResponse) -> Result<()> {
    match response.error_code() {
        Some(code) => Err(DeviceError::Rejected(format!(
            "{} answered {}",
            response.command().body(),
            code
        ))),
        None => Ok(()),
    }
}

struct Events {
    inner: Weak<Inner>,
}

impl NotificationListener<PjLinkResponse> for Events {
    fn on_notification(&self, notification: &PjLinkResponse) {
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

//! PJLink responses: `%1<BODY>=<VALUE>`

use std::fmt;

use super::auth::AUTHENTICATION_ERROR;
use super::command::PjLinkCommand;
use super::input::Input;
use crate::error::{ProtocolError, Result};
use crate::protocol::Reply;

/// Error codes a device can answer any command with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UndefinedCommand,
    OutOfParameter,
    UnavailableTime,
    DeviceFailure,
}

impl ErrorCode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "ERR1" => Some(ErrorCode::UndefinedCommand),
            "ERR2" => Some(ErrorCode::OutOfParameter),
            "ERR3" => Some(ErrorCode::UnavailableTime),
            "ERR4" => Some(ErrorCode::DeviceFailure),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::UndefinedCommand => "ERR1",
            ErrorCode::OutOfParameter => "ERR2",
            ErrorCode::UnavailableTime => "ERR3",
            ErrorCode::DeviceFailure => "ERR4",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            ErrorCode::UndefinedCommand => "Undefined command",
            ErrorCode::OutOfParameter => "Out of parameter",
            ErrorCode::UnavailableTime => "Unavailable time",
            ErrorCode::DeviceFailure => "Projector/Display failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.text(), self.code())
    }
}

/// Body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    /// `OK` acknowledgement of a set command
    Acknowledged,
    Error(ErrorCode),
    /// `PJLINK ERRA`
    AuthenticationFailed,
    /// A session greeting seen outside the handshake
    Greeting(String),
    Value(String),
}

/// Power states reported by `POWR ?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Off,
    On,
    Cooling,
    WarmUp,
}

impl PowerState {
    /// Warm-up already counts as on, cooling as off
    pub fn is_on(self) -> bool {
        matches!(self, PowerState::On | PowerState::WarmUp)
    }
}

/// Mute states reported by `AVMT ?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MuteState {
    pub audio: bool,
    pub video: bool,
}

/// Health of one component reported by `ERST ?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentStatus {
    Ok,
    Warning,
    Error,
}

/// `ERST ?` answer: fan, lamp, temperature, cover, filter, other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorStatus {
    pub fan: ComponentStatus,
    pub lamp: ComponentStatus,
    pub temperature: ComponentStatus,
    pub cover_open: ComponentStatus,
    pub filter: ComponentStatus,
    pub other: ComponentStatus,
}

impl ErrorStatus {
    pub fn is_ok(&self) -> bool {
        [
            self.fan,
            self.lamp,
            self.temperature,
            self.cover_open,
            self.filter,
            self.other,
        ]
        .iter()
        .all(|status| *status == ComponentStatus::Ok)
    }
}

/// One lamp entry of `LAMP ?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LampStatus {
    pub hours: u32,
    pub on: bool,
}

/// A parsed PJLink line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PjLinkResponse {
    command: PjLinkCommand,
    value: ResponseValue,
}

impl PjLinkResponse {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.eq_ignore_ascii_case(AUTHENTICATION_ERROR) {
            return Ok(Self::new(
                PjLinkCommand::Authentication,
                ResponseValue::AuthenticationFailed,
            ));
        }
        if line
            .get(..6)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("PJLINK"))
        {
            return Ok(Self::new(
                PjLinkCommand::Authentication,
                ResponseValue::Greeting(line.to_string()),
            ));
        }

        let unknown = || ProtocolError::UnknownResponse(line.to_string());
        let rest = line.strip_prefix('%').ok_or_else(unknown)?;
        let (header, value) = rest.split_once('=').ok_or_else(unknown)?;
        // header is the class digit followed by the four letter body
        if header.len() != 5 || !header.is_ascii() {
            return Err(unknown());
        }
        let command = PjLinkCommand::from_body(&header[1..]).ok_or_else(unknown)?;

        let value = if value.eq_ignore_ascii_case("OK") {
            ResponseValue::Acknowledged
        } else if let Some(error) = ErrorCode::from_code(value) {
            ResponseValue::Error(error)
        } else {
            ResponseValue::Value(value.to_string())
        };
        Ok(Self::new(command, value))
    }

    /// Placeholder used when a request is sent without waiting
    pub fn acknowledged(command: PjLinkCommand) -> Self {
        Self::new(command, ResponseValue::Acknowledged)
    }

    fn new(command: PjLinkCommand, value: ResponseValue) -> Self {
        Self { command, value }
    }

    pub fn command(&self) -> PjLinkCommand {
        self.command
    }

    pub fn value(&self) -> &ResponseValue {
        &self.value
    }

    /// `OK` reply to a set command
    pub fn is_acknowledged(&self) -> bool {
        self.value == ResponseValue::Acknowledged
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self.value {
            ResponseValue::Error(code) => Some(code),
            _ => None,
        }
    }

    /// The raw value, or an error for acknowledgements and error codes
    pub fn text(&self) -> Result<&str> {
        match &self.value {
            ResponseValue::Value(value) => Ok(value),
            ResponseValue::Acknowledged => Ok(""),
            other => Err(ProtocolError::UnexpectedValue {
                field: "response value",
                value: format!("{other:?}"),
            }),
        }
    }

    fn unexpected(&self, field: &'static str) -> ProtocolError {
        ProtocolError::UnexpectedValue {
            field,
            value: self.text().unwrap_or_default().to_string(),
        }
    }

    pub fn power_state(&self) -> Result<PowerState> {
        match self.text()? {
            "0" => Ok(PowerState::Off),
            "1" => Ok(PowerState::On),
            "2" => Ok(PowerState::Cooling),
            "3" => Ok(PowerState::WarmUp),
            _ => Err(self.unexpected("power state")),
        }
    }

    pub fn input(&self) -> Result<Input> {
        Input::from_code(self.text()?)
    }

    /// Inputs listed by `INST ?`
    pub fn input_list(&self) -> Result<Vec<Input>> {
        self.text()?.split_whitespace().map(Input::from_code).collect()
    }

    pub fn mute_state(&self) -> Result<MuteState> {
        match self.text()? {
            "11" => Ok(MuteState { audio: false, video: true }),
            "21" => Ok(MuteState { audio: true, video: false }),
            "31" => Ok(MuteState { audio: true, video: true }),
            "10" | "20" | "30" => Ok(MuteState::default()),
            _ => Err(self.unexpected("mute state")),
        }
    }

    pub fn error_status(&self) -> Result<ErrorStatus> {
        let statuses = self
            .text()?
            .chars()
            .map(|c| match c {
                '0' => Ok(ComponentStatus::Ok),
                '1' => Ok(ComponentStatus::Warning),
                '2' => Ok(ComponentStatus::Error),
                _ => Err(self.unexpected("error status")),
            })
            .collect::<Result<Vec<_>>>()?;

        match statuses.as_slice() {
            [fan, lamp, temperature, cover_open, filter, other] => Ok(ErrorStatus {
                fan: *fan,
                lamp: *lamp,
                temperature: *temperature,
                cover_open: *cover_open,
                filter: *filter,
                other: *other,
            }),
            _ => Err(self.unexpected("error status")),
        }
    }

    pub fn lamps(&self) -> Result<Vec<LampStatus>> {
        let fields: Vec<&str> = self.text()?.split_whitespace().collect();
        if fields.is_empty() || fields.len() % 2 != 0 {
            return Err(self.unexpected("lamp status"));
        }
        fields
            .chunks(2)
            .map(|pair| {
                let hours = pair[0]
                    .parse()
                    .map_err(|_| ProtocolError::InvalidNumber(pair[0].to_string()))?;
                let on = match pair[1] {
                    "1" => true,
                    "0" => false,
                    _ => return Err(self.unexpected("lamp status")),
                };
                Ok(LampStatus { hours, on })
            })
            .collect()
    }
}

impl Reply for PjLinkResponse {
    type Kind = PjLinkCommand;

    fn kind(&self) -> PjLinkCommand {
        self.command
    }

    fn zone(&self) -> u8 {
        1
    }

    fn is_error(&self) -> bool {
        matches!(
            self.value,
            ResponseValue::Error(_) | ResponseValue::AuthenticationFailed
        )
    }

    fn is_auth_failure(&self) -> bool {
        self.value == ResponseValue::AuthenticationFailed
    }
}

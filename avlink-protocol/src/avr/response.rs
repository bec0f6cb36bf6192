//! Responses and notifications sent by the receiver

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProtocolError, Result};
use crate::protocol::Reply;

/// Parameter values of `PWR`/`APR`/`BPR`/`ZEP`
pub mod power_state {
    pub const ON: &str = "0";
    pub const OFF: &str = "1";
}

/// Parameter values of `MUT`/`Z2MUT`/`Z3MUT`/`HZMUT`
pub mod mute_state {
    pub const ON: &str = "0";
    pub const OFF: &str = "1";
}

/// Classification of a receiver line.
///
/// Declaration order is the matching order used by [`Response::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseType {
    /// Sentinel for commands that expect no reply
    None,
    PowerState,
    VolumeLevel,
    MuteState,
    InputSourceChannel,
    DisplayInformation,
    UnknownCommand,
    UnknownParameter,
    GenericError,
}

impl ResponseType {
    pub const ALL: [ResponseType; 9] = [
        ResponseType::None,
        ResponseType::PowerState,
        ResponseType::VolumeLevel,
        ResponseType::MuteState,
        ResponseType::InputSourceChannel,
        ResponseType::DisplayInformation,
        ResponseType::UnknownCommand,
        ResponseType::UnknownParameter,
        ResponseType::GenericError,
    ];

    /// Literal line prefix for each zone, zone 1 first
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            ResponseType::None => &[],
            ResponseType::PowerState => &["PWR", "APR", "BPR", "ZEP"],
            ResponseType::VolumeLevel => &["VOL", "ZV", "YV", "XV"],
            ResponseType::MuteState => &["MUT", "Z2MUT", "Z3MUT", "HZMUT"],
            ResponseType::InputSourceChannel => &["FN", "Z2F", "Z3F", "ZEA"],
            ResponseType::DisplayInformation => &["FL"],
            ResponseType::UnknownCommand => &["E4"],
            ResponseType::UnknownParameter => &["E6"],
            ResponseType::GenericError => &["R"],
        }
    }

    pub fn parameter_pattern(self) -> &'static str {
        match self {
            ResponseType::PowerState | ResponseType::MuteState => "[0-1]",
            ResponseType::VolumeLevel => "[0-9]{2,3}",
            ResponseType::InputSourceChannel => "[0-9]{2}",
            ResponseType::DisplayInformation => "[0-9a-fA-F]{30}",
            _ => "",
        }
    }

    pub fn has_parameter(self) -> bool {
        !self.parameter_pattern().is_empty()
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            ResponseType::UnknownCommand
                | ResponseType::UnknownParameter
                | ResponseType::GenericError
        )
    }

    pub fn prefix(self, zone: u8) -> Option<&'static str> {
        let index = usize::from(zone).checked_sub(1)?;
        self.prefixes().get(index).copied()
    }

    /// Match `line` against every zone pattern of this type.
    ///
    /// Returns the zone and the captured parameter on success.
    pub fn match_line(self, line: &str) -> Option<(u8, Option<String>)> {
        let patterns = &RESPONSE_PATTERNS[self as usize];
        patterns.iter().enumerate().find_map(|(index, pattern)| {
            let captures = pattern.captures(line)?;
            let parameter = captures
                .get(1)
                .map(|m| m.as_str())
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            Some((index as u8 + 1, parameter))
        })
    }
}

/// Compiled `^prefix(parameter)$` patterns, indexed like [`ResponseType::ALL`]
static RESPONSE_PATTERNS: Lazy<Vec<Vec<Regex>>> = Lazy::new(|| {
    ResponseType::ALL
        .iter()
        .map(|response_type| {
            response_type
                .prefixes()
                .iter()
                .map(|prefix| {
                    let source = format!(
                        "^{}({})$",
                        regex::escape(prefix),
                        response_type.parameter_pattern()
                    );
                    Regex::new(&source)
                        .unwrap_or_else(|e| panic!("invalid response pattern {source}: {e}"))
                })
                .collect()
        })
        .collect()
});

/// A parsed receiver line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    response_type: ResponseType,
    zone: u8,
    parameter: Option<String>,
}

impl Response {
    /// Classify a raw line (without terminator)
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        ResponseType::ALL
            .iter()
            .find_map(|response_type| {
                response_type
                    .match_line(line)
                    .map(|(zone, parameter)| Response {
                        response_type: *response_type,
                        zone,
                        parameter,
                    })
            })
            .ok_or_else(|| ProtocolError::UnknownResponse(line.to_string()))
    }

    /// The reply synthesised for commands sent without waiting
    pub fn none(zone: u8) -> Self {
        Self {
            response_type: ResponseType::None,
            zone,
            parameter: None,
        }
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.response_type.is_error()
    }

    /// Power state reported by a `PowerState` response
    pub fn is_power_on(&self) -> bool {
        self.response_type == ResponseType::PowerState
            && self.parameter() == Some(power_state::ON)
    }

    /// Mute state reported by a `MuteState` response
    pub fn is_muted(&self) -> bool {
        self.response_type == ResponseType::MuteState && self.parameter() != Some(mute_state::OFF)
    }
}

impl Reply for Response {
    type Kind = ResponseType;

    fn kind(&self) -> ResponseType {
        self.response_type
    }

    fn zone(&self) -> u8 {
        self.zone
    }

    fn is_error(&self) -> bool {
        self.response_type.is_error()
    }
}

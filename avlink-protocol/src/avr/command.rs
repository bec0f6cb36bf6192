//! Commands understood by the receiver

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::response::ResponseType;
use crate::error::{ProtocolError, Result};
use crate::protocol::Request;

/// Every command the receiver accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    PowerOn,
    PowerOff,
    PowerQuery,
    VolumeUp,
    VolumeDown,
    VolumeQuery,
    MuteOn,
    MuteOff,
    MuteQuery,
    InputChangeCyclic,
    InputChangeReverse,
    InputQuery,
    DisplayQuery,
    /// Takes a native volume value, e.g. `093VL`
    VolumeSet,
    /// Takes a two digit source code, e.g. `19FN`
    InputChannelSet,
}

impl CommandType {
    pub const ALL: [CommandType; 15] = [
        CommandType::PowerOn,
        CommandType::PowerOff,
        CommandType::PowerQuery,
        CommandType::VolumeUp,
        CommandType::VolumeDown,
        CommandType::VolumeQuery,
        CommandType::MuteOn,
        CommandType::MuteOff,
        CommandType::MuteQuery,
        CommandType::InputChangeCyclic,
        CommandType::InputChangeReverse,
        CommandType::InputQuery,
        CommandType::DisplayQuery,
        CommandType::VolumeSet,
        CommandType::InputChannelSet,
    ];

    /// Literal command string for each zone, zone 1 first
    pub fn wire_table(self) -> &'static [&'static str] {
        match self {
            CommandType::PowerOn => &["PO", "APO", "BPO", "ZEO"],
            CommandType::PowerOff => &["PF", "APF", "BPF", "ZEF"],
            CommandType::PowerQuery => &["?P", "?AP", "?BP", "?ZEP"],
            CommandType::VolumeUp => &["VU", "ZU", "YU", "HZU"],
            CommandType::VolumeDown => &["VD", "ZD", "YD", "HZD"],
            CommandType::VolumeQuery => &["?V", "?ZV", "?YV", "?HZV"],
            CommandType::MuteOn => &["MO", "Z2MO", "Z3MO", "HZMO"],
            CommandType::MuteOff => &["MF", "Z2MF", "Z3MF", "HZMF"],
            CommandType::MuteQuery => &["?M", "?Z2M", "?Z3M", "?HZM"],
            CommandType::InputChangeCyclic => &["FU"],
            CommandType::InputChangeReverse => &["FD"],
            CommandType::InputQuery => &["?F", "?ZS", "?ZT", "?ZEA"],
            CommandType::DisplayQuery => &["?FL"],
            CommandType::VolumeSet => &["VL", "ZV", "YV", "HZV"],
            CommandType::InputChannelSet => &["FN", "ZS", "ZT", "ZEA"],
        }
    }

    pub fn expected_response(self) -> ResponseType {
        match self {
            CommandType::PowerOn | CommandType::PowerOff => ResponseType::None,
            CommandType::PowerQuery => ResponseType::PowerState,
            CommandType::VolumeUp
            | CommandType::VolumeDown
            | CommandType::VolumeQuery
            | CommandType::VolumeSet => ResponseType::VolumeLevel,
            CommandType::MuteOn | CommandType::MuteOff | CommandType::MuteQuery => {
                ResponseType::MuteState
            }
            CommandType::InputChangeCyclic
            | CommandType::InputChangeReverse
            | CommandType::InputQuery
            | CommandType::InputChannelSet => ResponseType::InputSourceChannel,
            CommandType::DisplayQuery => ResponseType::DisplayInformation,
        }
    }

    pub fn parameter_pattern(self) -> Option<&'static str> {
        match self {
            CommandType::VolumeSet => Some("[0-9]{2,3}"),
            CommandType::InputChannelSet => Some("[0-9]{2}"),
            _ => None,
        }
    }

    pub fn is_parameterized(self) -> bool {
        self.parameter_pattern().is_some()
    }

    pub fn supports_zone(self, zone: u8) -> bool {
        zone >= 1 && usize::from(zone) <= self.wire_table().len()
    }

    /// Wire string for `zone`.
    ///
    /// # Panics
    ///
    /// Panics when the command has no entry for `zone`.
    pub fn wire(self, zone: u8) -> &'static str {
        assert!(
            self.supports_zone(zone),
            "{self:?} has no command for zone {zone} (supported: 1..={})",
            self.wire_table().len()
        );
        self.wire_table()[usize::from(zone) - 1]
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

static PARAMETER_PATTERNS: Lazy<Vec<(CommandType, Regex)>> = Lazy::new(|| {
    CommandType::ALL
        .iter()
        .filter_map(|command_type| {
            let pattern = command_type.parameter_pattern()?;
            let source = format!("^{pattern}$");
            let regex = Regex::new(&source)
                .unwrap_or_else(|e| panic!("invalid parameter pattern {source}: {e}"));
            Some((*command_type, regex))
        })
        .collect()
});

/// A command bound to a zone, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    command_type: CommandType,
    zone: u8,
    parameter: Option<String>,
}

impl Command {
    /// A command without parameter.
    ///
    /// # Panics
    ///
    /// Panics for parameterized command types, or a zone the command does
    /// not exist for.
    pub fn new(command_type: CommandType, zone: u8) -> Self {
        assert!(
            !command_type.is_parameterized(),
            "{command_type:?} needs a parameter"
        );
        command_type.wire(zone);
        Self {
            command_type,
            zone,
            parameter: None,
        }
    }

    /// A parameterized command, validating the parameter format
    pub fn with_parameter(
        command_type: CommandType,
        zone: u8,
        parameter: impl Into<String>,
    ) -> Result<Self> {
        let parameter = parameter.into();
        command_type.wire(zone);
        let pattern = PARAMETER_PATTERNS
            .iter()
            .find(|(candidate, _)| *candidate == command_type)
            .map(|(_, regex)| regex);

        match pattern {
            Some(regex) if regex.is_match(&parameter) => Ok(Self {
                command_type,
                zone,
                parameter: Some(parameter),
            }),
            _ => Err(ProtocolError::InvalidParameter {
                command: command_type.to_string(),
                value: parameter,
                pattern: command_type.parameter_pattern().unwrap_or("").to_string(),
            }),
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    pub fn expected_response(&self) -> ResponseType {
        self.command_type.expected_response()
    }

    pub fn is_response_expected(&self) -> bool {
        self.expected_response() != ResponseType::None
    }

    /// Wire form with trailing carriage return; parameters come first
    pub fn serialize(&self) -> String {
        let wire = self.command_type.wire(self.zone);
        match &self.parameter {
            Some(parameter) => format!("{parameter}{wire}\r"),
            None => format!("{wire}\r"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.serialize().trim_end())
    }
}

impl Request for Command {
    type Kind = ResponseType;

    fn wire(&self) -> String {
        self.serialize()
    }

    fn expected(&self) -> Option<ResponseType> {
        self.is_response_expected().then(|| self.expected_response())
    }

    fn zone(&self) -> u8 {
        self.zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CommandType::PowerOn, 1, "PO\r")]
    #[case(CommandType::PowerOn, 2, "APO\r")]
    #[case(CommandType::PowerOff, 4, "ZEF\r")]
    #[case(CommandType::PowerQuery, 3, "?BP\r")]
    #[case(CommandType::VolumeUp, 4, "HZU\r")]
    #[case(CommandType::VolumeQuery, 2, "?ZV\r")]
    #[case(CommandType::MuteOn, 2, "Z2MO\r")]
    #[case(CommandType::MuteQuery, 1, "?M\r")]
    #[case(CommandType::InputChangeCyclic, 1, "FU\r")]
    #[case(CommandType::InputQuery, 3, "?ZT\r")]
    #[case(CommandType::DisplayQuery, 1, "?FL\r")]
    fn test_serialize(#[case] command_type: CommandType, #[case] zone: u8, #[case] wire: &str) {
        assert_eq!(Command::new(command_type, zone).serialize(), wire);
    }

    #[test]
    fn test_parameter_comes_first() {
        let command = Command::with_parameter(CommandType::VolumeSet, 1, "093").unwrap();
        assert_eq!(command.serialize(), "093VL\r");

        let command = Command::with_parameter(CommandType::InputChannelSet, 2, "04").unwrap();
        assert_eq!(command.serialize(), "04ZS\r");
        assert_eq!(command.to_string(), "04ZS");
    }

    #[rstest]
    #[case(CommandType::VolumeSet, "9")]
    #[case(CommandType::VolumeSet, "1000")]
    #[case(CommandType::InputChannelSet, "1")]
    #[case(CommandType::InputChannelSet, "AB")]
    fn test_invalid_parameter(#[case] command_type: CommandType, #[case] parameter: &str) {
        assert!(matches!(
            Command::with_parameter(command_type, 1, parameter),
            Err(ProtocolError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_response_expectation() {
        assert!(!Command::new(CommandType::PowerOn, 1).is_response_expected());
        assert!(!Command::new(CommandType::PowerOff, 1).is_response_expected());
        assert_eq!(Command::new(CommandType::PowerOn, 1).expected(), None);

        let query = Command::new(CommandType::VolumeQuery, 2);
        assert!(query.is_response_expected());
        assert_eq!(query.expected(), Some(ResponseType::VolumeLevel));
    }

    #[test]
    fn test_zone_support() {
        assert!(CommandType::MuteOn.supports_zone(4));
        assert!(!CommandType::DisplayQuery.supports_zone(2));
        assert!(!CommandType::PowerOn.supports_zone(0));
    }

    #[test]
    #[should_panic(expected = "has no command for zone 2")]
    fn test_zone_without_wire_string_panics() {
        Command::new(CommandType::InputChangeCyclic, 2);
    }

    #[test]
    #[should_panic(expected = "needs a parameter")]
    fn test_parameterized_without_parameter_panics() {
        Command::new(CommandType::VolumeSet, 1);
    }
}

//! PJLink class 1 requests

use std::fmt;

use super::input::Input;
use crate::protocol::Request;

/// The four letter command body shared by a request and its response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PjLinkCommand {
    Power,
    Input,
    AvMute,
    ErrorStatus,
    Lamp,
    InputList,
    Name,
    Manufacturer,
    Model,
    Class,
    OtherInformation,
    /// Pseudo kind for `PJLINK ...` session lines
    Authentication,
}

impl PjLinkCommand {
    pub const ALL: [PjLinkCommand; 11] = [
        PjLinkCommand::Power,
        PjLinkCommand::Input,
        PjLinkCommand::AvMute,
        PjLinkCommand::ErrorStatus,
        PjLinkCommand::Lamp,
        PjLinkCommand::InputList,
        PjLinkCommand::Name,
        PjLinkCommand::Manufacturer,
        PjLinkCommand::Model,
        PjLinkCommand::Class,
        PjLinkCommand::OtherInformation,
    ];

    pub fn body(self) -> &'static str {
        match self {
            PjLinkCommand::Power => "POWR",
            PjLinkCommand::Input => "INPT",
            PjLinkCommand::AvMute => "AVMT",
            PjLinkCommand::ErrorStatus => "ERST",
            PjLinkCommand::Lamp => "LAMP",
            PjLinkCommand::InputList => "INST",
            PjLinkCommand::Name => "NAME",
            PjLinkCommand::Manufacturer => "INF1",
            PjLinkCommand::Model => "INF2",
            PjLinkCommand::Class => "CLSS",
            PjLinkCommand::OtherInformation => "INFO",
            PjLinkCommand::Authentication => "PJLINK",
        }
    }

    pub fn from_body(body: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|command| command.body().eq_ignore_ascii_case(body))
    }
}

/// Which picture/sound output an `AVMT` request mutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuteTarget {
    Video,
    Audio,
    AudioAndVideo,
}

impl MuteTarget {
    fn code(self) -> char {
        match self {
            MuteTarget::Video => '1',
            MuteTarget::Audio => '2',
            MuteTarget::AudioAndVideo => '3',
        }
    }
}

/// A PJLink request: `%1<BODY> <PARAMETER>\r`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PjLinkRequest {
    command: PjLinkCommand,
    parameter: String,
}

impl PjLinkRequest {
    fn new(command: PjLinkCommand, parameter: impl Into<String>) -> Self {
        Self {
            command,
            parameter: parameter.into(),
        }
    }

    /// `?` request for any readable command
    pub fn query(command: PjLinkCommand) -> Self {
        Self::new(command, "?")
    }

    pub fn power(on: bool) -> Self {
        Self::new(PjLinkCommand::Power, if on { "1" } else { "0" })
    }

    pub fn select_input(input: Input) -> Self {
        Self::new(PjLinkCommand::Input, input.code())
    }

    pub fn mute(target: MuteTarget, muted: bool) -> Self {
        let state = if muted { '1' } else { '0' };
        Self::new(PjLinkCommand::AvMute, format!("{}{}", target.code(), state))
    }

    pub fn command(&self) -> PjLinkCommand {
        self.command
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn is_query(&self) -> bool {
        self.parameter == "?"
    }

    pub fn serialize(&self) -> String {
        format!("%1{} {}\r", self.command.body(), self.parameter)
    }
}

impl fmt::Display for PjLinkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%1{} {}", self.command.body(), self.parameter)
    }
}

impl Request for PjLinkRequest {
    type Kind = PjLinkCommand;

    fn wire(&self) -> String {
        self.serialize()
    }

    fn expected(&self) -> Option<PjLinkCommand> {
        Some(self.command)
    }

    fn zone(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pjlink::input::InputType;

    #[test]
    fn test_request_wire_format() {
        assert_eq!(PjLinkRequest::power(true).serialize(), "%1POWR 1\r");
        assert_eq!(PjLinkRequest::power(false).serialize(), "%1POWR 0\r");
        assert_eq!(
            PjLinkRequest::query(PjLinkCommand::Power).serialize(),
            "%1POWR ?\r"
        );
        assert_eq!(
            PjLinkRequest::query(PjLinkCommand::Manufacturer).serialize(),
            "%1INF1 ?\r"
        );

        let input = Input::new(InputType::Digital, 1).unwrap();
        assert_eq!(PjLinkRequest::select_input(input).serialize(), "%1INPT 31\r");
    }

    #[test]
    fn test_mute_parameters() {
        assert_eq!(PjLinkRequest::mute(MuteTarget::Video, true).parameter(), "11");
        assert_eq!(PjLinkRequest::mute(MuteTarget::Audio, false).parameter(), "20");
        assert_eq!(
            PjLinkRequest::mute(MuteTarget::AudioAndVideo, true).parameter(),
            "31"
        );
    }

    #[test]
    fn test_every_request_expects_its_own_reply() {
        let request = PjLinkRequest::query(PjLinkCommand::Lamp);
        assert!(request.is_query());
        assert_eq!(request.expected(), Some(PjLinkCommand::Lamp));
        assert_eq!(Request::zone(&request), 1);
    }

    #[test]
    fn test_body_lookup() {
        assert_eq!(PjLinkCommand::from_body("AVMT"), Some(PjLinkCommand::AvMute));
        assert_eq!(PjLinkCommand::from_body("XXXX"), None);
    }
}

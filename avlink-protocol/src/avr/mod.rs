//! Pioneer-style receiver line protocol
//!
//! Commands are short ASCII strings terminated by `\r` (`?P`, `PO`, `093VL`);
//! the receiver answers or notifies with prefixed lines (`PWR0`, `VOL093`).
//! Each command and response exists once per zone with a different literal
//! prefix, so both sides are table driven.

mod command;
mod display;
mod response;

pub use command::{Command, CommandType};
pub use display::decode_display_information;
pub use response::{mute_state, power_state, Response, ResponseType};

use crate::error::Result;
use crate::protocol::Protocol;

/// Default TCP port of the receiver's telnet interface
pub const DEFAULT_PORT: u16 = 23;

/// The receiver protocol as seen by the connection layer
#[derive(Debug, Clone, Copy, Default)]
pub struct AvrProtocol;

impl Protocol for AvrProtocol {
    type Kind = ResponseType;
    type Command = Command;
    type Response = Response;

    fn name(&self) -> &'static str {
        "avr"
    }

    fn parse(&self, line: &str) -> Result<Response> {
        Response::parse(line)
    }

    fn no_response(&self, command: &Command) -> Response {
        Response::none(command.zone())
    }
}

//! PJLink class 1 projector protocol
//!
//! Requests look like `%1POWR 1`, responses like `%1POWR=OK`. A session
//! starts with a greeting from the device; when it carries a random number
//! the first command must be prefixed with an MD5 digest of that number and
//! the shared password.

mod auth;
mod command;
mod input;
mod response;

pub use auth::{digest, Greeting, AUTHENTICATION_ERROR};
pub use command::{MuteTarget, PjLinkCommand, PjLinkRequest};
pub use input::{Input, InputType};
pub use response::{
    ComponentStatus, ErrorCode, ErrorStatus, LampStatus, MuteState, PjLinkResponse, PowerState,
    ResponseValue,
};

use crate::error::Result;
use crate::protocol::Protocol;

pub const DEFAULT_PORT: u16 = 4352;

/// PJLink as seen by the connection layer
#[derive(Clone, Default)]
pub struct PjLinkProtocol {
    password: Option<String>,
}

impl PjLinkProtocol {
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Debug for PjLinkProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PjLinkProtocol")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Protocol for PjLinkProtocol {
    type Kind = PjLinkCommand;
    type Command = PjLinkRequest;
    type Response = PjLinkResponse;

    fn name(&self) -> &'static str {
        "pjlink"
    }

    fn parse(&self, line: &str) -> Result<PjLinkResponse> {
        PjLinkResponse::parse(line)
    }

    fn no_response(&self, command: &PjLinkRequest) -> PjLinkResponse {
        PjLinkResponse::acknowledged(command.command())
    }

    fn expects_greeting(&self) -> bool {
        true
    }

    fn greet(&self, greeting: &str) -> Result<Option<String>> {
        let greeting = Greeting::parse(greeting)?;
        if let Greeting::Challenge(_) = greeting {
            tracing::debug!("PJLink device requests authentication");
        }
        greeting.session_prefix(self.password.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn test_greet_without_authentication() {
        let protocol = PjLinkProtocol::new(None);
        assert_eq!(protocol.greet("PJLINK 0").unwrap(), None);
    }

    #[test]
    fn test_greet_with_challenge() {
        let protocol = PjLinkProtocol::new(Some("JBMIAProjectorLink".to_string()));
        assert_eq!(
            protocol.greet("PJLINK 1 498e4a67").unwrap().as_deref(),
            Some("5d8409bc1c3fa39749434aa3a5c38682")
        );
    }

    #[test]
    fn test_empty_password_counts_as_missing() {
        let protocol = PjLinkProtocol::new(Some(String::new()));
        assert!(!protocol.has_password());
        assert_eq!(
            protocol.greet("PJLINK 1 00112233"),
            Err(ProtocolError::PasswordRequired)
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let protocol = PjLinkProtocol::new(Some("secret".to_string()));
        assert!(!format!("{protocol:?}").contains("secret"));
    }
}

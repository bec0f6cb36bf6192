//! PJLink session greeting and challenge/response digest

use md5::{Digest, Md5};

use crate::error::{ProtocolError, Result};

/// Line a device sends when it rejects the digest
pub const AUTHENTICATION_ERROR: &str = "PJLINK ERRA";

/// First line of a PJLink session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Greeting {
    /// `PJLINK 0`
    Open,
    /// `PJLINK 1 <random>`, the random number must be hashed with the password
    Challenge(String),
}

impl Greeting {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.eq_ignore_ascii_case(AUTHENTICATION_ERROR) {
            return Err(ProtocolError::AuthenticationRejected);
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(tag), Some("0"), None) if tag.eq_ignore_ascii_case("PJLINK") => {
                Ok(Greeting::Open)
            }
            (Some(tag), Some("1"), Some(random)) if tag.eq_ignore_ascii_case("PJLINK") => {
                Ok(Greeting::Challenge(random.to_string()))
            }
            _ => Err(ProtocolError::InvalidGreeting(line.to_string())),
        }
    }

    /// Prefix to put in front of the next command, if authentication is needed
    pub fn session_prefix(&self, password: Option<&str>) -> Result<Option<String>> {
        match (self, password) {
            (Greeting::Open, _) => Ok(None),
            (Greeting::Challenge(random), Some(password)) => Ok(Some(digest(random, password))),
            (Greeting::Challenge(_), None) => Err(ProtocolError::PasswordRequired),
        }
    }
}

/// Challenge response: lowercase hex MD5 of the random number followed by the password
pub fn digest(random: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(random.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

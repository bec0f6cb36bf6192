//! PJLink input designations (`INPT`)

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Rgb,
    Video,
    Digital,
    Storage,
    Network,
}

impl InputType {
    pub const ALL: [InputType; 5] = [
        InputType::Rgb,
        InputType::Video,
        InputType::Digital,
        InputType::Storage,
        InputType::Network,
    ];

    pub fn code(self) -> char {
        match self {
            InputType::Rgb => '1',
            InputType::Video => '2',
            InputType::Digital => '3',
            InputType::Storage => '4',
            InputType::Network => '5',
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            InputType::Rgb => "RGB",
            InputType::Video => "Video",
            InputType::Digital => "Digital",
            InputType::Storage => "Storage",
            InputType::Network => "Network",
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    fn from_text(text: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.text().eq_ignore_ascii_case(text))
    }
}

/// A validated two character input designation such as `31` (Digital 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Input {
    input_type: InputType,
    number: u8,
}

impl Input {
    pub fn new(input_type: InputType, number: u8) -> Result<Self> {
        if number > 9 {
            return Err(ProtocolError::InvalidInput(format!(
                "{} {number}",
                input_type.text()
            )));
        }
        Ok(Self { input_type, number })
    }

    /// Parse the wire form, e.g. `"31"`
    pub fn from_code(code: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidInput(code.to_string());
        let mut chars = code.chars();
        let (Some(kind), Some(number), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(invalid());
        };
        let input_type = InputType::from_code(kind).ok_or_else(invalid)?;
        let number = number.to_digit(10).ok_or_else(invalid)?;
        Self::new(input_type, number as u8)
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn code(&self) -> String {
        format!("{}{}", self.input_type.code(), self.number)
    }

    /// Human readable form, e.g. `"Digital 1"`
    pub fn text(&self) -> String {
        format!("{} {}", self.input_type.text(), self.number)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Accepts either the wire code (`"31"`) or the text form (`"Digital 1"`)
impl FromStr for Input {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some((kind, number)) = value.rsplit_once(' ') {
            let input_type = InputType::from_text(kind.trim())
                .ok_or_else(|| ProtocolError::InvalidInput(value.to_string()))?;
            let number = number
                .parse()
                .map_err(|_| ProtocolError::InvalidInput(value.to_string()))?;
            return Self::new(input_type, number);
        }
        Self::from_code(value)
    }
}

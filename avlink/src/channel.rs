//! Channels, values and updates exchanged with device listeners

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A controllable or observable aspect of a device, per zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Power,
    VolumeDb,
    VolumePercent,
    Mute,
    InputSource,
    DisplayInformation,
    /// Projector audio mute
    AudioMute,
    /// Projector picture mute
    VideoMute,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 8] = [
        ChannelKind::Power,
        ChannelKind::VolumeDb,
        ChannelKind::VolumePercent,
        ChannelKind::Mute,
        ChannelKind::InputSource,
        ChannelKind::DisplayInformation,
        ChannelKind::AudioMute,
        ChannelKind::VideoMute,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ChannelKind::Power => "power",
            ChannelKind::VolumeDb => "volumeDb",
            ChannelKind::VolumePercent => "volumePercent",
            ChannelKind::Mute => "mute",
            ChannelKind::InputSource => "inputSource",
            ChannelKind::DisplayInformation => "displayInformation",
            ChannelKind::AudioMute => "audioMute",
            ChannelKind::VideoMute => "videoMute",
        }
    }

    /// Receiver channels reset when a zone powers off
    pub fn resets_on_power_off(self) -> bool {
        matches!(
            self,
            ChannelKind::VolumeDb
                | ChannelKind::VolumePercent
                | ChannelKind::Mute
                | ChannelKind::InputSource
        )
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown channel '{s}'"))
    }
}

/// Current value of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum StateValue {
    OnOff(bool),
    Percent(f64),
    Decibel(f64),
    Text(String),
    /// The device does not report a value, e.g. the zone is off
    Undefined,
}

impl StateValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, StateValue::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::OnOff(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Percent(value) | StateValue::Decibel(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::OnOff(true) => write!(f, "ON"),
            StateValue::OnOff(false) => write!(f, "OFF"),
            StateValue::Percent(value) => write!(f, "{value:.1}%"),
            StateValue::Decibel(value) => write!(f, "{value:.1} dB"),
            StateValue::Text(value) => write!(f, "{value}"),
            StateValue::Undefined => write!(f, "UNDEF"),
        }
    }
}

/// An intent sent to a channel
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    On,
    Off,
    Increase,
    Decrease,
    Percent(f64),
    Decibel(f64),
    Text(String),
    /// Ask the device for the current value
    Refresh,
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandValue::On => write!(f, "ON"),
            CommandValue::Off => write!(f, "OFF"),
            CommandValue::Increase => write!(f, "INCREASE"),
            CommandValue::Decrease => write!(f, "DECREASE"),
            CommandValue::Percent(value) => write!(f, "{value}%"),
            CommandValue::Decibel(value) => write!(f, "{value} dB"),
            CommandValue::Text(value) => write!(f, "'{value}'"),
            CommandValue::Refresh => write!(f, "REFRESH"),
        }
    }
}

/// Parses the textual forms used on the command line:
/// `on`, `off`, `up`, `down`, `refresh`, `42%`, `-30.5dB`, anything else as text
impl FromStr for CommandValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = match trimmed.to_ascii_lowercase().as_str() {
            "on" => CommandValue::On,
            "off" => CommandValue::Off,
            "up" | "increase" => CommandValue::Increase,
            "down" | "decrease" => CommandValue::Decrease,
            "refresh" => CommandValue::Refresh,
            lower => {
                let percent = lower.strip_suffix('%').and_then(|v| v.trim().parse().ok());
                let decibel = lower.strip_suffix("db").and_then(|v| v.trim().parse().ok());
                match (percent, decibel) {
                    (Some(p), _) => CommandValue::Percent(p),
                    (_, Some(db)) => CommandValue::Decibel(db),
                    _ => CommandValue::Text(trimmed.to_string()),
                }
            }
        };
        Ok(value)
    }
}

/// A state change reported to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub channel: ChannelKind,
    pub zone: u8,
    pub value: StateValue,
}

impl StateUpdate {
    pub fn new(channel: ChannelKind, zone: u8, value: StateValue) -> Self {
        Self {
            channel,
            zone,
            value,
        }
    }
}

impl fmt::Display for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone{}#{} = {}", self.zone, self.channel, self.value)
    }
}

/// Reachability of a device as seen by the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceStatus {
    Unknown,
    Online,
    Offline,
}

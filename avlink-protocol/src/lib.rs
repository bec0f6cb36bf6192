//! Wire model for avlink devices
//!
//! Two protocols live here:
//!
//! - [`avr`]: the line protocol of Pioneer-style AV receivers, with per-zone
//!   command and response tables, display text decoding, and the
//!   [`VolumeConverter`] that maps percent and dB onto native volume steps;
//! - [`pjlink`]: PJLink class 1 for projectors and displays, including the
//!   challenge/response authentication.
//!
//! Both implement [`Protocol`], which is all the connection layer needs to
//! correlate replies with requests.
//!
//! # Example
//!
//! ```rust
//! use avlink_protocol::avr::{Command, CommandType, Response, ResponseType};
//! use avlink_protocol::{ModelProperties, VolumeConverter};
//!
//! let converter = VolumeConverter::new(&ModelProperties::vsx_1120());
//! let level = converter.percent_to_wire(50.0, 1);
//! let command = Command::with_parameter(CommandType::VolumeSet, 1, level).unwrap();
//! assert_eq!(command.serialize(), "093VL\r");
//!
//! let response = Response::parse("VOL093").unwrap();
//! assert_eq!(response.response_type(), ResponseType::VolumeLevel);
//! ```

pub mod avr;
pub mod error;
pub mod model;
pub mod pjlink;
pub mod protocol;
pub mod volume;

pub use error::{ProtocolError, Result};
pub use model::{InputSource, ModelOverrides, ModelProperties, VolumeOverride, ZoneProperties};
pub use protocol::{correlates, Protocol, Reply, Request};
pub use volume::VolumeConverter;

//! # avlink - control of AV receivers and PJLink projectors
//!
//! Sync-first device facades over persistent line-protocol connections:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use avlink::{ChannelKind, CommandValue, Endpoint, Receiver, ReceiverConfig, StateCache};
//!
//! fn main() -> Result<(), avlink::DeviceError> {
//!     let config = ReceiverConfig::new(Endpoint::tcp("192.168.1.20")).with_model("VSX-1120");
//!     let receiver = Receiver::new(&config)?;
//!
//!     let cache = Arc::new(StateCache::new());
//!     receiver.add_listener(cache.clone());
//!     receiver.initialize();
//!
//!     receiver.handle_command(ChannelKind::Power, 1, CommandValue::On)?;
//!     receiver.handle_command(ChannelKind::VolumeDb, 1, CommandValue::Decibel(-35.0))?;
//!
//!     for update in cache.iter() {
//!         println!("{update}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! avlink (Receiver, Projector, StateCache)
//!     ↓
//! avlink-connection (Connection, correlation, debounce, health check)
//!     ↓
//! avlink-protocol (receiver and PJLink wire models, volume conversion)
//!     ↓
//! avlink-transport (TCP, serial)
//! ```
//!
//! Every state change is reported as a [`StateUpdate`] of a channel and zone
//! to the registered [`DeviceListener`]s.

pub mod channel;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod projector;
pub mod receiver;
pub mod state;

pub use channel::{ChannelKind, CommandValue, DeviceStatus, StateUpdate, StateValue};
pub use config::{Endpoint, ProjectorConfig, ReceiverConfig};
pub use error::{DeviceError, Result};
pub use listener::DeviceListener;
pub use projector::{Projector, ProjectorInfo};
pub use receiver::Receiver;
pub use state::{ChangeIterator, StateCache};

// Lower layers, for callers that tune timings or drive a connection directly
pub use avlink_connection::{ConnectionConfig, ConnectionError};
pub use avlink_protocol::{ModelOverrides, ModelProperties, VolumeOverride};
pub use avlink_protocol::pjlink::{
    ComponentStatus, ErrorStatus, Input, InputType, LampStatus, PowerState,
};

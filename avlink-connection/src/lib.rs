//! Connection layer for avlink devices
//!
//! [`Connection`] keeps a persistent stream to one device and turns it into a
//! request/response channel plus a stream of notifications:
//!
//! - one request is in flight at a time; the reader thread hands the first
//!   correlating line to the waiting sender (any error line correlates);
//! - every other line is a notification, debounced per response kind and zone
//!   and delivered to [`NotificationListener`]s;
//! - I/O failures close the stream and reach [`ConnectionListener`]s.
//!
//! All callbacks run sequentially on the connection's [`Scheduler`].
//!
//! # Example
//!
//! ```rust,no_run
//! use avlink_connection::{Connection, ConnectionConfig};
//! use avlink_protocol::avr::{AvrProtocol, Command, CommandType};
//! use avlink_transport::TcpTransport;
//!
//! # fn main() -> avlink_connection::Result<()> {
//! let connection = Connection::new(
//!     AvrProtocol,
//!     TcpTransport::new("192.168.1.20", 23),
//!     ConnectionConfig::default(),
//! )?;
//! let power = connection.send(&Command::new(CommandType::PowerQuery, 1))?;
//! println!("power on: {}", power.is_power_on());
//! # Ok(())
//! # }
//! ```

pub mod burst;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod health;
pub mod listener;
pub mod notifier;
pub mod scheduler;

pub use burst::{BurstSender, BurstSettings};
pub use config::ConnectionConfig;
pub use connection::{wait_for_state, Connection, ConnectionState};
pub use error::{ConnectionError, Result};
pub use health::HealthMonitor;
pub use listener::{ConnectionListener, ListenerSet, NotificationListener};
pub use scheduler::{Scheduler, TaskHandle};

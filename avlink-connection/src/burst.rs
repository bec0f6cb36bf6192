//! Reaching a target value through repeated step commands
//!
//! Devices without a "set" command for a value only move it one step per
//! up/down command. A ramp queries the current value, then sends as many step
//! commands as needed. With burst mode on, the steps are written back to back
//! without waiting for replies; replies that come back mid-burst are treated
//! as ordinary notifications.

use std::thread;
use std::time::Duration;

use avlink_protocol::Protocol;
use parking_lot::{Mutex, MutexGuard};

use crate::connection::Connection;
use crate::error::Result;

/// How step commands are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstSettings {
    /// Send without waiting for replies
    pub enabled: bool,
    /// Pause between two commands of a burst
    pub delay: Duration,
}

impl Default for BurstSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: Duration::from_millis(10),
        }
    }
}

impl BurstSettings {
    pub fn enabled(delay: Duration) -> Self {
        Self {
            enabled: true,
            delay,
        }
    }
}

/// Sends step commands for one device, one ramp at a time
#[derive(Debug, Default)]
pub struct BurstSender {
    settings: BurstSettings,
    ramp_lock: Mutex<()>,
}

impl BurstSender {
    pub fn new(settings: BurstSettings) -> Self {
        Self {
            settings,
            ramp_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> BurstSettings {
        self.settings
    }

    /// Send `command` `count` times
    pub fn send_burst<P: Protocol>(
        &self,
        connection: &Connection<P>,
        command: &P::Command,
        count: u64,
    ) -> Result<()> {
        let wait = !self.settings.enabled;
        for sent in 0..count {
            if sent > 0 && self.settings.enabled && !self.settings.delay.is_zero() {
                thread::sleep(self.settings.delay);
            }
            connection.send_with(command, wait)?;
        }
        Ok(())
    }

    /// Move a value to `target` with up/down step commands.
    ///
    /// `query` reads the current value, which `read_current` extracts from
    /// the reply. Returns the number of steps sent, negative for `down`.
    /// Concurrent ramps on the same sender run one after the other in
    /// arrival order.
    pub fn ramp<P, F>(
        &self,
        connection: &Connection<P>,
        query: &P::Command,
        up: &P::Command,
        down: &P::Command,
        target: i64,
        read_current: F,
    ) -> Result<i64>
    where
        P: Protocol,
        F: FnOnce(&P::Response) -> Result<i64>,
    {
        let guard = self.ramp_lock.lock();

        let reply = connection.send(query)?;
        let current = read_current(&reply)?;
        let delta = target - current;
        tracing::debug!(
            "Ramping from {} to {} ({} steps, burst {})",
            current,
            target,
            delta,
            if self.settings.enabled { "on" } else { "off" }
        );

        let step = if delta < 0 { down } else { up };
        let result = self.send_burst(connection, step, delta.unsigned_abs());

        MutexGuard::unlock_fair(guard);
        result.map(|_| delta)
    }
}

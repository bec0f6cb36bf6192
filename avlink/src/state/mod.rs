//! Latest known value of every channel of a device
//!
//! [`StateCache`] is a [`DeviceListener`]: register it on a receiver or a
//! projector and it records each update, queueing only real changes for its
//! [`ChangeIterator`].

mod iter;

pub use iter::{ChangeIterator, TimeoutIter, TryIter};

use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::channel::{ChannelKind, DeviceStatus, StateUpdate, StateValue};
use crate::listener::DeviceListener;

pub struct StateCache {
    values: RwLock<HashMap<(ChannelKind, u8), StateValue>>,
    status: RwLock<DeviceStatus>,
    change_tx: mpsc::Sender<StateUpdate>,
    change_rx: Arc<Mutex<mpsc::Receiver<StateUpdate>>>,
}

impl StateCache {
    pub fn new() -> Self {
        let (change_tx, change_rx) = mpsc::channel();
        Self {
            values: RwLock::new(HashMap::new()),
            status: RwLock::new(DeviceStatus::Unknown),
            change_tx,
            change_rx: Arc::new(Mutex::new(change_rx)),
        }
    }

    pub fn get(&self, channel: ChannelKind, zone: u8) -> Option<StateValue> {
        self.values.read().get(&(channel, zone)).cloned()
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.read()
    }

    /// Record `update`; returns `true` when the value changed
    pub fn apply(&self, update: &StateUpdate) -> bool {
        let previous = self
            .values
            .write()
            .insert((update.channel, update.zone), update.value.clone());
        if previous.as_ref() == Some(&update.value) {
            return false;
        }
        // Nobody iterating is fine
        let _ = self.change_tx.send(update.clone());
        true
    }

    /// Every known value, ordered by zone then channel
    pub fn snapshot(&self) -> Vec<StateUpdate> {
        let mut updates: Vec<StateUpdate> = self
            .values
            .read()
            .iter()
            .map(|((channel, zone), value)| StateUpdate::new(*channel, *zone, value.clone()))
            .collect();
        updates.sort_by_key(|update| (update.zone, update.channel));
        updates
    }

    /// Iterator over future changes
    pub fn iter(&self) -> ChangeIterator {
        ChangeIterator::new(Arc::clone(&self.change_rx))
    }

    /// Poll until a value is known for the channel or `timeout` passes
    pub fn wait_for(
        &self,
        channel: ChannelKind,
        zone: u8,
        timeout: Duration,
    ) -> Option<StateValue> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.get(channel, zone) {
                return Some(value);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("status", &self.status())
            .field("values", &self.len())
            .finish()
    }
}

impl DeviceListener for StateCache {
    fn state_changed(&self, update: &StateUpdate) {
        self.apply(update);
    }

    fn status_changed(&self, status: DeviceStatus, detail: Option<&str>) {
        tracing::debug!("Device status {:?} ({})", status, detail.unwrap_or("-"));
        *self.status.write() = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_reports_changes_only() {
        let cache = StateCache::new();
        let iter = cache.iter();
        let on = StateUpdate::new(ChannelKind::Power, 1, StateValue::OnOff(true));

        assert!(cache.apply(&on));
        assert!(!cache.apply(&on));
        assert!(cache.apply(&StateUpdate::new(ChannelKind::Power, 2, StateValue::OnOff(true))));

        assert_eq!(cache.get(ChannelKind::Power, 1), Some(StateValue::OnOff(true)));
        assert_eq!(cache.get(ChannelKind::Mute, 1), None);
        assert_eq!(iter.try_iter().count(), 2);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let cache = StateCache::new();
        cache.apply(&StateUpdate::new(ChannelKind::Mute, 2, StateValue::OnOff(false)));
        cache.apply(&StateUpdate::new(ChannelKind::VolumeDb, 1, StateValue::Decibel(-40.0)));
        cache.apply(&StateUpdate::new(ChannelKind::Power, 1, StateValue::OnOff(true)));

        let keys: Vec<_> = cache
            .snapshot()
            .into_iter()
            .map(|update| (update.zone, update.channel))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, ChannelKind::Power),
                (1, ChannelKind::VolumeDb),
                (2, ChannelKind::Mute)
            ]
        );
    }

    #[test]
    fn test_listener_records_status() {
        let cache = Arc::new(StateCache::new());
        let listener: Arc<dyn DeviceListener> = cache.clone();
        listener.status_changed(DeviceStatus::Offline, Some("unreachable"));
        assert_eq!(cache.status(), DeviceStatus::Offline);

        listener.state_changed(&StateUpdate::new(ChannelKind::Mute, 1, StateValue::Undefined));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_wait_for_times_out() {
        let cache = StateCache::new();
        assert_eq!(cache.wait_for(ChannelKind::Power, 1, Duration::from_millis(20)), None);
    }
}

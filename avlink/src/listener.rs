//! Callbacks for device consumers

use crate::channel::{DeviceStatus, StateUpdate};

/// Receives state updates and status changes of a device.
///
/// Callbacks run sequentially on the device connection's scheduler thread,
/// in registration order. Do not block in them: a slow listener holds back
/// every later update of the same device.
pub trait DeviceListener: Send + Sync {
    fn state_changed(&self, update: &StateUpdate);

    /// `detail` explains an offline transition
    fn status_changed(&self, _status: DeviceStatus, _detail: Option<&str>) {}
}

impl<F> DeviceListener for F
where
    F: Fn(&StateUpdate) + Send + Sync,
{
    fn state_changed(&self, update: &StateUpdate) {
        self(update)
    }
}

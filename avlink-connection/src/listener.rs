//! Listener traits and the ordered subscriber lists behind them
//!
//! Callbacks run on the connection's scheduler thread, one at a time and in
//! registration order. A slow listener delays every listener after it and
//! every later event of the same connection, so listeners should hand heavy
//! work off to their own threads.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConnectionError;

/// Receives unsolicited device messages after debouncing
pub trait NotificationListener<R>: Send + Sync {
    fn on_notification(&self, notification: &R);
}

impl<R, F> NotificationListener<R> for F
where
    F: Fn(&R) + Send + Sync,
{
    fn on_notification(&self, notification: &R) {
        self(notification)
    }
}

/// Receives connection lifecycle events
pub trait ConnectionListener: Send + Sync {
    /// The stream is open and the handshake (if any) succeeded
    fn on_connected(&self) {}

    /// The stream broke or could not be opened
    fn on_disconnected(&self, _cause: &ConnectionError) {}
}

/// Ordered list of subscribers
pub struct ListenerSet<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<L>) {
        self.listeners.write().push(listener);
    }

    /// Remove a listener by identity; returns whether it was registered
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Copy of the current list, so callbacks run without holding the lock
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_is_notification_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |value: &u32| sink.lock().push(*value);

        listener.on_notification(&7);
        assert_eq!(*seen.lock(), vec![7]);
    }

    #[test]
    fn test_set_keeps_registration_order() {
        let set: ListenerSet<dyn NotificationListener<u32>> = ListenerSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3u32 {
            let order = Arc::clone(&order);
            set.add(Arc::new(move |_: &u32| order.lock().push(id)));
        }
        for listener in set.snapshot() {
            listener.on_notification(&0);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_by_identity() {
        struct Quiet;
        impl ConnectionListener for Quiet {}

        let set: ListenerSet<dyn ConnectionListener> = ListenerSet::new();
        let first: Arc<dyn ConnectionListener> = Arc::new(Quiet);
        let second: Arc<dyn ConnectionListener> = Arc::new(Quiet);
        set.add(Arc::clone(&first));
        set.add(Arc::clone(&second));

        assert!(set.remove(&first));
        assert!(!set.remove(&first));
        assert_eq!(set.len(), 1);
    }
}

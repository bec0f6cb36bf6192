//! Blocking iterator over state changes
//!
//! - Blocking: `recv()`, `for update in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;

use crate::channel::StateUpdate;

/// Changes recorded by a [`StateCache`](super::StateCache).
///
/// Every iterator of one cache drains the same queue, so an update is seen
/// by exactly one of them.
///
/// # Example
///
/// ```rust,ignore
/// for update in cache.iter().timeout_iter(Duration::from_secs(5)) {
///     println!("{update}");
/// }
/// ```
pub struct ChangeIterator {
    rx: Arc<Mutex<mpsc::Receiver<StateUpdate>>>,
}

impl ChangeIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<StateUpdate>>>) -> Self {
        Self { rx }
    }

    /// Block until the next change; `None` once the cache is gone
    pub fn recv(&self) -> Option<StateUpdate> {
        self.rx.lock().recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<StateUpdate> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<StateUpdate> {
        self.rx.lock().try_recv().ok()
    }

    /// Changes already queued, without blocking
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Blocks up to `timeout` per item, ends at the first quiet period
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for ChangeIterator {
    type Item = StateUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

pub struct TryIter<'a> {
    inner: &'a ChangeIterator,
}

impl Iterator for TryIter<'_> {
    type Item = StateUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

pub struct TimeoutIter<'a> {
    inner: &'a ChangeIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIter<'_> {
    type Item = StateUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

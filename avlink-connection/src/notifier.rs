//! Per-key debouncing of notification delivery

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::scheduler::{Scheduler, TaskHandle};

struct Pending {
    seq: u64,
    task: TaskHandle,
}

/// Delays delivery so that only the latest of a rapid series reaches listeners.
///
/// A submission replaces any delivery still waiting for the same key and
/// restarts its delay.
pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
    next_seq: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Copy + Eq + Hash + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `deliver` for `key` on `scheduler`
    pub fn submit<F>(&self, scheduler: &Scheduler, key: K, deliver: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        // Hold the map lock while scheduling so the job sees its own entry
        let mut pending = self.pending.lock();
        let map = Arc::clone(&self.pending);
        let task = scheduler.schedule(self.delay, move || {
            let current = {
                let mut map = map.lock();
                match map.get(&key) {
                    Some(entry) if entry.seq == seq => {
                        map.remove(&key);
                        true
                    }
                    _ => false,
                }
            };
            if current {
                deliver();
            }
        });

        if let Some(replaced) = pending.insert(key, Pending { seq, task }) {
            replaced.task.cancel();
        }
    }

    /// Keys with a delivery still waiting
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel every waiting delivery
    pub fn cancel_all(&self) {
        for (_, entry) in self.pending.lock().drain() {
            entry.task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_latest_value_wins_within_window() {
        let scheduler = Scheduler::new("debounce-test").unwrap();
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();

        for value in 1..=3 {
            let tx = tx.clone();
            debouncer.submit(&scheduler, "volume", move || tx.send(value).unwrap());
        }

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 3);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let scheduler = Scheduler::new("debounce-test").unwrap();
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let (tx, rx) = mpsc::channel();

        let power = tx.clone();
        debouncer.submit(&scheduler, ("power", 1u8), move || power.send("power").unwrap());
        debouncer.submit(&scheduler, ("mute", 1u8), move || tx.send("mute").unwrap());

        let mut seen: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["mute", "power"]);
    }

    #[test]
    fn test_submissions_outside_window_are_all_delivered() {
        let scheduler = Scheduler::new("debounce-test").unwrap();
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let (tx, rx) = mpsc::channel();

        for value in 0..2 {
            let tx = tx.clone();
            debouncer.submit(&scheduler, 0u8, move || tx.send(value).unwrap());
            thread::sleep(Duration::from_millis(60));
        }

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 0);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
    }

    #[test]
    fn test_concurrent_submissions_deliver_once() {
        let scheduler = Scheduler::new("debounce-test").unwrap();
        let debouncer = Debouncer::new(Duration::from_millis(200));
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for id in 0..4 {
                let (scheduler, debouncer, tx) = (&scheduler, &debouncer, tx.clone());
                scope.spawn(move || {
                    for _ in 0..25 {
                        let tx = tx.clone();
                        debouncer.submit(scheduler, "volume", move || tx.send(id).unwrap());
                    }
                });
            }
        });

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let scheduler = Scheduler::new("debounce-test").unwrap();
        let debouncer = Debouncer::new(Duration::from_millis(30));
        let (tx, rx) = mpsc::channel::<()>();
        debouncer.submit(&scheduler, 1u8, move || tx.send(()).unwrap());

        debouncer.cancel_all();
        assert!(rx.recv_timeout(Duration::from_millis(80)).is_err());
    }
}

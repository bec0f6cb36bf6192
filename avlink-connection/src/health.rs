//! Periodic probe run while a device is believed offline

use std::time::Duration;

use parking_lot::Mutex;

use crate::scheduler::{Scheduler, TaskHandle};

/// Owns the periodic health-check task of one connection.
///
/// The probe is started when the device goes offline and stopped once it is
/// back. Starting twice is a no-op.
#[derive(Debug)]
pub struct HealthMonitor {
    initial_delay: Duration,
    period: Duration,
    task: Mutex<Option<TaskHandle>>,
}

impl HealthMonitor {
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        Self {
            initial_delay,
            period,
            task: Mutex::new(None),
        }
    }

    /// Start probing; returns `false` if a probe task is already running
    pub fn start<F>(&self, scheduler: &Scheduler, probe: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(is_live) {
            return false;
        }

        tracing::info!(
            "Starting health check (first probe in {:?}, then every {:?})",
            self.initial_delay,
            self.period
        );
        *task = Some(scheduler.schedule_with_fixed_delay(self.initial_delay, self.period, probe));
        true
    }

    /// Stop probing; returns `false` if nothing was running
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(task) if is_live(&task) => {
                task.cancel();
                tracing::info!("Stopped health check");
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(is_live)
    }
}

fn is_live(task: &TaskHandle) -> bool {
    !task.is_cancelled() && !task.is_finished()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_probe_runs_periodically() {
        let scheduler = Scheduler::new("health-test").unwrap();
        let monitor = HealthMonitor::new(Duration::from_millis(10), Duration::from_millis(20));
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);

        assert!(monitor.start(&scheduler, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(monitor.is_running());

        thread::sleep(Duration::from_millis(120));
        assert!(monitor.stop());
        assert!(!monitor.is_running());
        assert!(probes.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_duplicate_start_is_ignored() {
        let scheduler = Scheduler::new("health-test").unwrap();
        let monitor = HealthMonitor::new(Duration::from_secs(5), Duration::from_secs(5));

        assert!(monitor.start(&scheduler, || {}));
        assert!(!monitor.start(&scheduler, || {}));
        assert_eq!(scheduler.pending(), 1);

        assert!(monitor.stop());
        assert!(!monitor.stop());
        // Can be started again after a stop
        assert!(monitor.start(&scheduler, || {}));
    }
}

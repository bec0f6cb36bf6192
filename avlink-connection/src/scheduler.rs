//! Single-threaded task scheduler
//!
//! Every connection owns one [`Scheduler`]. It runs notification deliveries,
//! connection events and the health check on a dedicated worker thread that
//! owns a current-thread tokio runtime, so jobs never run concurrently. Jobs
//! submitted with [`Scheduler::execute`] from one thread run in submission
//! order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{ConnectionError, Result};

#[derive(Debug, Default)]
struct TaskState {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Handle to a scheduled job
#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    fn discarded() -> Self {
        let state = TaskState::default();
        state.finished.store(true, Ordering::Release);
        Self {
            state: Arc::new(state),
            abort: None,
        }
    }

    /// Prevent any future run of the job.
    ///
    /// Returns `false` if the job had already finished or was cancelled. A run
    /// that is in progress completes.
    pub fn cancel(&self) -> bool {
        if self.is_finished() {
            return false;
        }
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(abort) = &self.abort {
            abort.abort();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// True once a one-shot job has run or a cancelled job has been discarded
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }
}

/// Marks a task finished when its future is dropped, whether it ran to the
/// end, was aborted or was discarded with the runtime.
struct FinishGuard {
    state: Arc<TaskState>,
    live: Arc<AtomicUsize>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.state.finished.store(true, Ordering::Release);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs jobs on a dedicated worker thread
pub struct Scheduler {
    handle: Handle,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    shut_down: AtomicBool,
    live: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl Scheduler {
    /// Spawn the worker thread and its runtime
    pub fn new(name: &str) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if ready_tx.send(Ok(rt.handle().clone())).is_err() {
                    return;
                }

                // Dropping the runtime afterwards discards every task still queued
                rt.block_on(async {
                    let _ = shutdown_rx.await;
                });
            })
            .map_err(|e| ConnectionError::Thread(format!("{name}: {e}")))?;

        let handle = match ready_rx.recv() {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(ConnectionError::Thread(format!(
                    "{name}: failed to create runtime: {e}"
                )))
            }
            Err(_) => {
                return Err(ConnectionError::Thread(format!(
                    "{name}: worker exited during startup"
                )))
            }
        };

        Ok(Self {
            handle,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shut_down: AtomicBool::new(false),
            live: Arc::new(AtomicUsize::new(0)),
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Run `job` as soon as the worker is free
    pub fn execute<F>(&self, job: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(Duration::ZERO, job)
    }

    /// Run `job` once after `delay`
    pub fn schedule<F>(&self, delay: Duration, job: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(move |state| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !state.cancelled.load(Ordering::Acquire) {
                run_job(job);
            }
        })
    }

    /// Run `job` after `initial_delay`, then again `period` after each run ends
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        mut job: F,
    ) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(move |state| async move {
            tokio::time::sleep(initial_delay).await;
            while !state.cancelled.load(Ordering::Acquire) {
                run_job(&mut job);
                tokio::time::sleep(period).await;
            }
        })
    }

    /// True when called from a job running on this scheduler
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Number of jobs that have not finished, periodic ones included
    pub fn pending(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Stop the worker, dropping every queued job.
    ///
    /// Waits for a running job to finish unless called from the worker itself.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        if self.is_worker_thread() {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("Scheduler worker exited with a panic");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn spawn<M, Fut>(&self, make: M) -> TaskHandle
    where
        M: FnOnce(Arc<TaskState>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            tracing::debug!("Job submitted after scheduler shutdown, discarding");
            return TaskHandle::discarded();
        }

        let state = Arc::new(TaskState::default());
        self.live.fetch_add(1, Ordering::AcqRel);
        let guard = FinishGuard {
            state: Arc::clone(&state),
            live: Arc::clone(&self.live),
        };
        let future = make(Arc::clone(&state));
        let join = self.handle.spawn(async move {
            let _guard = guard;
            future.await;
        });

        TaskHandle {
            state,
            abort: Some(join.abort_handle()),
        }
    }
}

/// Run one job, keeping the worker alive if it panics
fn run_job<F: FnOnce()>(job: F) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("Scheduled job panicked");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn scheduler() -> Scheduler {
        Scheduler::new("test-scheduler").unwrap()
    }

    #[test]
    fn test_execute_runs_job() {
        let scheduler = scheduler();
        let (tx, rx) = mpsc::channel();
        scheduler.execute(move || tx.send(42).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
    }

    #[test]
    fn test_jobs_run_in_due_order() {
        let scheduler = scheduler();
        let (tx, rx) = mpsc::channel();

        let late = tx.clone();
        scheduler.schedule(Duration::from_millis(60), move || late.send("late").unwrap());
        let early = tx.clone();
        scheduler.schedule(Duration::from_millis(20), move || early.send("early").unwrap());
        scheduler.execute(move || tx.send("now").unwrap());

        let order: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(order, vec!["now", "early", "late"]);
    }

    #[test]
    fn test_immediate_jobs_keep_submission_order() {
        let scheduler = scheduler();
        let (tx, rx) = mpsc::channel();
        // Block the worker so every job below is queued behind it
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        scheduler.execute(move || {
            let _ = gate_rx.recv_timeout(Duration::from_secs(1));
        });
        for i in 0..5 {
            let tx = tx.clone();
            scheduler.execute(move || tx.send(i).unwrap());
        }
        gate_tx.send(()).unwrap();

        let order: Vec<_> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_jobs_never_overlap() {
        let scheduler = scheduler();
        let running = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        for _ in 0..4 {
            let running = Arc::clone(&running);
            let tx = tx.clone();
            scheduler.execute(move || {
                let overlapped = running.swap(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.store(false, Ordering::SeqCst);
                tx.send(overlapped).unwrap();
            });
        }

        for _ in 0..4 {
            assert!(!rx.recv_timeout(Duration::from_secs(1)).unwrap());
        }
    }

    #[test]
    fn test_cancelled_job_does_not_run() {
        let scheduler = scheduler();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = scheduler.schedule(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });

        assert!(handle.cancel());
        assert!(!handle.cancel());
        thread::sleep(Duration::from_millis(120));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(handle.is_finished());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_fixed_delay_repeats_until_cancelled() {
        let scheduler = scheduler();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = scheduler.schedule_with_fixed_delay(
            Duration::from_millis(5),
            Duration::from_millis(10),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        thread::sleep(Duration::from_millis(100));
        handle.cancel();
        let after_cancel = runs.load(Ordering::SeqCst);
        assert!(after_cancel >= 3, "only {after_cancel} runs");

        thread::sleep(Duration::from_millis(60));
        // At most the run that was in progress when cancelling
        assert!(runs.load(Ordering::SeqCst) <= after_cancel + 1);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let scheduler = scheduler();
        scheduler.execute(|| panic!("listener bug"));
        let (tx, rx) = mpsc::channel();
        scheduler.execute(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_shutdown_discards_pending_jobs() {
        let scheduler = scheduler();
        let handle = scheduler.schedule(Duration::from_secs(60), || {});
        assert_eq!(scheduler.pending(), 1);

        scheduler.shutdown();
        assert!(scheduler.is_shutdown());
        assert!(handle.is_finished());
        assert!(!handle.cancel());
        assert_eq!(scheduler.pending(), 0);

        let late = scheduler.execute(|| {});
        assert!(late.is_finished());
    }

    #[test]
    fn test_shutdown_from_worker_thread() {
        let scheduler = Arc::new(scheduler());
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&scheduler);
        scheduler.execute(move || {
            tx.send(inner.is_worker_thread()).unwrap();
            inner.shutdown();
        });
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
        assert!(!scheduler.is_worker_thread());
    }
}

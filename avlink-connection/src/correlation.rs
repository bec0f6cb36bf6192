//! Hand-off of a correlated reply from the reader thread to the sender

use std::time::{Duration, Instant};

use avlink_protocol::{correlates, Reply};
use parking_lot::{Condvar, Mutex};

/// What the in-flight request is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation<K> {
    pub kind: K,
    pub zone: u8,
}

/// How a wait on the slot ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<R> {
    Response(R),
    TimedOut,
    /// The stream went away while waiting
    Aborted,
}

#[derive(Debug)]
struct SlotState<K, R> {
    pending: Option<Expectation<K>>,
    response: Option<R>,
    aborted: bool,
}

/// Holds at most one pending expectation and its answer
#[derive(Debug)]
pub struct CorrelationSlot<K, R> {
    state: Mutex<SlotState<K, R>>,
    arrived: Condvar,
}

impl<K, R> Default for CorrelationSlot<K, R> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: None,
                response: None,
                aborted: false,
            }),
            arrived: Condvar::new(),
        }
    }
}

impl<K, R> CorrelationSlot<K, R>
where
    K: Copy + PartialEq,
    R: Reply<Kind = K>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the expectation before the request is written
    pub fn arm(&self, kind: K, zone: u8) {
        let mut state = self.state.lock();
        state.pending = Some(Expectation { kind, zone });
        state.response = None;
        state.aborted = false;
    }

    pub fn pending(&self) -> Option<Expectation<K>> {
        self.state.lock().pending
    }

    /// Give a parsed line to the waiting sender.
    ///
    /// Hands the reply back when nothing is pending or it does not correlate;
    /// the caller then treats it as a notification.
    pub fn offer(&self, reply: R) -> Result<(), R> {
        let mut state = self.state.lock();
        match state.pending {
            Some(expectation)
                if state.response.is_none()
                    && correlates(&reply, expectation.kind, expectation.zone) =>
            {
                state.response = Some(reply);
                self.arrived.notify_all();
                Ok(())
            }
            _ => Err(reply),
        }
    }

    /// Block until the reply arrives, the slot is aborted or `timeout` passes.
    ///
    /// The expectation is cleared whatever the outcome.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome<R> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.response.is_none() && !state.aborted {
            if self.arrived.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        state.pending = None;
        let aborted = std::mem::take(&mut state.aborted);
        match state.response.take() {
            Some(reply) => WaitOutcome::Response(reply),
            None if aborted => WaitOutcome::Aborted,
            None => WaitOutcome::TimedOut,
        }
    }

    /// Release a waiting sender, as on close or stream failure
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if state.pending.is_some() {
            state.aborted = true;
            self.arrived.notify_all();
        }
    }

    /// Forget the expectation without waiting, used when the write failed
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.response = None;
        state.aborted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avlink_protocol::avr::{Response, ResponseType};
    use std::sync::Arc;
    use std::thread;

    type Slot = CorrelationSlot<ResponseType, Response>;

    fn line(text: &str) -> Response {
        Response::parse(text).unwrap()
    }

    #[test]
    fn test_offer_without_pending_is_notification() {
        let slot = Slot::new();
        assert!(slot.offer(line("PWR0")).is_err());
    }

    #[test]
    fn test_only_correlating_reply_is_taken() {
        let slot = Slot::new();
        slot.arm(ResponseType::VolumeLevel, 1);

        // Other type, then same type on another zone
        assert!(slot.offer(line("MUT0")).is_err());
        assert!(slot.offer(line("ZV50")).is_err());
        assert!(slot.offer(line("VOL093")).is_ok());
        // A second match while the first is unclaimed goes to listeners
        assert!(slot.offer(line("VOL094")).is_err());

        match slot.wait(Duration::from_millis(10)) {
            WaitOutcome::Response(reply) => assert_eq!(reply.parameter(), Some("093")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(slot.pending().is_none());
    }

    #[test]
    fn test_error_reply_answers_any_request() {
        let slot = Slot::new();
        slot.arm(ResponseType::InputSourceChannel, 2);
        assert!(slot.offer(line("E4")).is_ok());
    }

    #[test]
    fn test_timeout_clears_pending() {
        let slot = Slot::new();
        slot.arm(ResponseType::PowerState, 1);
        assert_eq!(slot.wait(Duration::from_millis(20)), WaitOutcome::TimedOut);
        assert!(slot.pending().is_none());
        // Late reply after the timeout is a notification
        assert!(slot.offer(line("PWR0")).is_err());
    }

    #[test]
    fn test_reply_from_reader_thread_wakes_sender() {
        let slot = Arc::new(Slot::new());
        slot.arm(ResponseType::PowerState, 1);

        let reader = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            reader.offer(line("PWR0")).is_ok()
        });

        let outcome = slot.wait(Duration::from_secs(1));
        assert!(handle.join().unwrap());
        assert!(matches!(outcome, WaitOutcome::Response(ref r) if r.is_power_on()));
    }

    #[test]
    fn test_abort_releases_waiter() {
        let slot = Arc::new(Slot::new());
        slot.arm(ResponseType::MuteState, 1);

        let closer = Arc::clone(&slot);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.abort();
        });

        assert_eq!(slot.wait(Duration::from_secs(1)), WaitOutcome::Aborted);
        assert!(slot.pending().is_none());
    }

    #[test]
    fn test_abort_without_pending_is_ignored() {
        let slot = Slot::new();
        slot.abort();
        slot.arm(ResponseType::MuteState, 1);
        assert_eq!(slot.wait(Duration::from_millis(10)), WaitOutcome::TimedOut);
    }
}

//! Progress reporting port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Calls are synchronous and fire-and-forget; implementations must not
//!   block (a UI adapter should forward to its own thread).
//! - [`ProgressCounter`] is a thread-safe in-memory implementation used by
//!   headless runs and tests.

use std::sync::Mutex;
use std::time::Duration;

use crate::domain::KeyedError;

/// Receiver of upload progress events
pub trait IProgressSink: Send + Sync {
    /// Adds `count` files that were already complete before this run
    fn update_success(&self, count: usize);

    /// Records one more successfully uploaded file
    fn increment_success(&self);

    /// Records a failure the user can act on
    fn add_failure(&self, error: KeyedError);

    /// Notifies that a unit of work is sleeping before a retry
    fn on_backoff_delay(&self, delay: Duration);

    /// Marks the end of the run
    fn close(&self, success: bool);
}

#[derive(Debug, Default)]
struct CounterInner {
    succeeded: usize,
    failures: Vec<KeyedError>,
    backoff_delays: Vec<Duration>,
    closed: Option<bool>,
}

/// In-memory progress sink that records everything it receives
#[derive(Debug, Default)]
pub struct ProgressCounter {
    inner: Mutex<CounterInner>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> usize {
        self.inner.lock().unwrap().succeeded
    }

    pub fn failures(&self) -> Vec<KeyedError> {
        self.inner.lock().unwrap().failures.clone()
    }

    pub fn backoff_delays(&self) -> Vec<Duration> {
        self.inner.lock().unwrap().backoff_delays.clone()
    }

    /// `Some(success)` once [`IProgressSink::close`] has been called
    pub fn closed(&self) -> Option<bool> {
        self.inner.lock().unwrap().closed
    }
}

impl IProgressSink for ProgressCounter {
    fn update_success(&self, count: usize) {
        self.inner.lock().unwrap().succeeded += count;
    }

    fn increment_success(&self) {
        self.inner.lock().unwrap().succeeded += 1;
    }

    fn add_failure(&self, error: KeyedError) {
        self.inner.lock().unwrap().failures.push(error);
    }

    fn on_backoff_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().backoff_delays.push(delay);
    }

    fn close(&self, success: bool) {
        self.inner.lock().unwrap().closed = Some(success);
    }
}

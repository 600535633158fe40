//! Cancellable deferred tasks.
//!
//! The multiplexer debounces channel teardown by scheduling a task and
//! keeping its [`TaskHandle`] on the channel record. Two schedulers are
//! provided:
//! - [`TimerThread`]: wall-clock timers on one background thread
//! - [`ManualClock`]: virtual time advanced explicitly, for tests and hosts
//!   that drive their own event loop

mod manual;
mod timer;

pub use manual::ManualClock;
pub use timer::TimerThread;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Work to run once a delay has elapsed.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run once `delay` has elapsed.
    ///
    /// The task must not run on the calling thread before `schedule`
    /// returns: callers schedule while holding locks the task will take.
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        (**self).schedule(delay, task)
    }
}

/// Handle to a scheduled task.
///
/// Cancelling is idempotent: cancelling twice, or after the task already
/// ran, does nothing.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle whose task will never run.
    pub(crate) fn cancelled() -> Self {
        let handle = Self::new();
        handle.cancel();
        handle
    }

    /// Prevent the task from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

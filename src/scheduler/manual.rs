//! Virtual-time scheduler driven by explicit `advance` calls.

use super::{Scheduler, Task, TaskHandle};
use parking_lot::Mutex;
use std::time::Duration;

struct ManualEntry {
    deadline: Duration,
    seq: u64,
    handle: TaskHandle,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    queue: Vec<ManualEntry>,
}

/// A scheduler whose clock only moves when told to.
///
/// Tasks run on the thread calling [`ManualClock::advance`], outside the
/// clock's lock, so a task may schedule further tasks.
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of scheduled tasks that are neither run nor cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .count()
    }

    /// Move the clock forward, running every task that comes due, in
    /// deadline order (ties in scheduling order).
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;

        while let Some(entry) = self.pop_due(target) {
            if !entry.handle.is_cancelled() {
                (entry.task)();
            }
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
    }

    fn pop_due(&self, target: Duration) -> Option<ManualEntry> {
        let mut state = self.state.lock();
        let index = state
            .queue
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= target)
            .min_by_key(|(_, e)| (e.deadline, e.seq))
            .map(|(i, _)| i)?;

        let entry = state.queue.swap_remove(index);
        if state.now < entry.deadline {
            state.now = entry.deadline;
        }
        Some(entry)
    }
}

impl Scheduler for ManualClock {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.state.lock();
        let entry = ManualEntry {
            deadline: state.now + delay,
            seq: state.next_seq,
            handle: handle.clone(),
            task,
        };
        state.next_seq += 1;
        state.queue.push(entry);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_task_runs_only_when_due() {
        let clock = ManualClock::new();
        let fired = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&fired);
        clock.schedule(
            Duration::from_millis(250),
            Box::new(move || *flag.lock() = true),
        );

        clock.advance(Duration::from_millis(249));
        assert!(!*fired.lock());
        assert_eq!(clock.pending(), 1);

        clock.advance(Duration::from_millis(1));
        assert!(*fired.lock());
        assert_eq!(clock.pending(), 0);
        assert_eq!(clock.now(), Duration::from_millis(250));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let clock = ManualClock::new();
        let fired = Arc::new(Mutex::new(0));

        let count = Arc::clone(&fired);
        let handle = clock.schedule(
            Duration::from_millis(10),
            Box::new(move || *count.lock() += 1),
        );
        handle.cancel();
        handle.cancel();
        assert_eq!(clock.pending(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(*fired.lock(), 0);

        // Cancelling after the fact is still a no-op.
        handle.cancel();
    }

    #[test]
    fn test_tasks_can_schedule_tasks() {
        let clock = Arc::new(ManualClock::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_clock = Arc::clone(&clock);
        let inner_log = Arc::clone(&log);
        clock.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_log.lock().push("outer");
                let log = Arc::clone(&inner_log);
                inner_clock.schedule(
                    Duration::from_millis(10),
                    Box::new(move || log.lock().push("inner")),
                );
            }),
        );

        clock.advance(Duration::from_millis(20));
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }
}

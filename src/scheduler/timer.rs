//! Wall-clock scheduler backed by a single timer thread.

use super::{Scheduler, Task, TaskHandle};
use crate::error::Result;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Command {
    Schedule(TimerEntry),
    Shutdown,
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    handle: TaskHandle,
    task: Task,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed: BinaryHeap is a max-heap and we want the earliest deadline.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Runs scheduled tasks on a dedicated background thread.
///
/// Tasks run one at a time in deadline order. Dropping the scheduler stops
/// the thread; tasks that have not fired yet are discarded.
pub struct TimerThread {
    sender: Sender<Command>,
    next_seq: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerThread {
    /// Start the timer thread.
    pub fn new() -> Result<Self> {
        let (sender, receiver) = unbounded::<Command>();

        let worker = thread::Builder::new()
            .name("hotsock-turbo-timer".to_string())
            .spawn(move || {
                let mut heap: BinaryHeap<TimerEntry> = BinaryHeap::new();

                loop {
                    let command = match heap.peek() {
                        Some(next) => receiver.recv_deadline(next.deadline),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(Command::Schedule(entry)) => heap.push(entry),
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    let now = Instant::now();
                    while heap.peek().map_or(false, |e| e.deadline <= now) {
                        let Some(entry) = heap.pop() else { break };
                        if entry.handle.is_cancelled() {
                            continue;
                        }
                        if panic::catch_unwind(AssertUnwindSafe(entry.task)).is_err() {
                            tracing::error!(seq = entry.seq, "scheduled task panicked");
                        }
                    }
                }

                tracing::debug!(discarded = heap.len(), "timer thread stopped");
            })?;

        Ok(Self {
            sender,
            next_seq: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the timer thread and wait for it to exit.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("timer thread panicked");
            }
        }
    }
}

impl Scheduler for TimerThread {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let entry = TimerEntry {
            deadline: Instant::now() + delay,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            handle: handle.clone(),
            task,
        };

        if self.sender.send(Command::Schedule(entry)).is_err() {
            tracing::warn!("timer thread stopped; task dropped");
            return TaskHandle::cancelled();
        }

        handle
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_runs_after_delay() {
        let timer = TimerThread::new().unwrap();
        let (tx, rx) = bounded(1);

        let start = Instant::now();
        timer.schedule(
            Duration::from_millis(30),
            Box::new(move || {
                let _ = tx.send(Instant::now());
            }),
        );

        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired.duration_since(start) >= Duration::from_millis(30));
    }

    #[test]
    fn test_cancelled_task_never_runs() {
        let timer = TimerThread::new().unwrap();
        let (tx, rx) = bounded::<()>(1);

        let handle = timer.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        handle.cancel();
        handle.cancel();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let timer = TimerThread::new().unwrap();
        let (tx, rx) = unbounded();

        for (delay, label) in [(40, "late"), (10, "early")] {
            let tx = tx.clone();
            timer.schedule(
                Duration::from_millis(delay),
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            );
        }

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!((first, second), ("early", "late"));
    }

    #[test]
    fn test_schedule_after_shutdown_is_inert() {
        let timer = TimerThread::new().unwrap();
        timer.shutdown();

        let handle = timer.schedule(Duration::ZERO, Box::new(|| {}));
        assert!(handle.is_cancelled());
    }
}

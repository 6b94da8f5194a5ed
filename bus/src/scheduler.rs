//! Single-threaded cooperative event loop & priority scheduler (C1).
//!
//! Multiple loops may coexist; cross-loop communication goes through
//! [`crate::queue::MpmcQueue`], never shared mutable state. Within a
//! `Scheduler`, task dispatch is totally ordered by [`Priority`] with FIFO
//! within a priority, and a starvation guard forces a drain of lower
//! queues after a run of high-priority dispatches.

use crate::timer::{TimerEntry, TimerWheel};
use common::constants::HIGH_PRIORITY_STARVATION_LIMIT;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// A unit of work posted to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Dispatch priority. `Critical` is highest, `Low` is lowest; variants are
/// declared in ascending order so the derived `Ord` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    fn slot(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }
}

/// Handle returned by `post*`, usable with [`Scheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Errors returned by scheduler control operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
}

struct QueuedTask {
    handle: u64,
    task: Task,
}

/// A single-threaded priority scheduler with a millisecond timer wheel.
pub struct Scheduler {
    queues: [VecDeque<QueuedTask>; 4],
    wheel: TimerWheel,
    next_handle: u64,
    canceled: FxHashSet<u64>,
    running: bool,
    stop_requested: bool,
    high_priority_streak: u32,
    start: Instant,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a new, stopped scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
            wheel: TimerWheel::new(),
            next_handle: 0,
            canceled: FxHashSet::default(),
            running: false,
            stop_requested: false,
            high_priority_streak: 0,
            start: Instant::now(),
        }
    }

    fn next_handle(&mut self) -> TaskHandle {
        let h = self.next_handle;
        self.next_handle += 1;
        TaskHandle(h)
    }

    /// Post a task for immediate dispatch at `priority`.
    pub fn post(&mut self, task: Task, priority: Priority) -> TaskHandle {
        let handle = self.next_handle();
        self.queues[priority.slot()].push_back(QueuedTask {
            handle: handle.0,
            task,
        });
        handle
    }

    /// Post a task to run after `delay` has elapsed.
    pub fn post_after(&mut self, task: Task, delay: Duration, priority: Priority) -> TaskHandle {
        let deadline_ms = self.elapsed_ms() + delay.as_millis() as u64;
        self.post_at_ms(task, deadline_ms, priority)
    }

    /// Post a task to run once `deadline` (an `Instant`) has passed.
    pub fn post_at(&mut self, task: Task, deadline: Instant, priority: Priority) -> TaskHandle {
        let deadline_ms = deadline.saturating_duration_since(self.start).as_millis() as u64;
        self.post_at_ms(task, deadline_ms, priority)
    }

    fn post_at_ms(&mut self, task: Task, deadline_ms: u64, priority: Priority) -> TaskHandle {
        let handle = self.next_handle();
        if deadline_ms <= self.elapsed_ms() {
            self.queues[priority.slot()].push_back(QueuedTask {
                handle: handle.0,
                task,
            });
        } else {
            self.wheel.insert(TimerEntry {
                handle: handle.0,
                deadline_ms,
                priority,
                task,
            });
        }
        handle
    }

    /// Cancel a previously posted task. Best-effort: a no-op once the task
    /// has already been dispatched, never an error.
    pub fn cancel(&mut self, handle: TaskHandle) {
        self.canceled.insert(handle.0);
    }

    /// Request the loop to stop. `Critical` and `High` queues still drain;
    /// `Normal` and `Low` may be discarded once `run` observes the request.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// `true` while inside `run`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Run the loop until `stop` has been called and both `Critical` and
    /// `High` queues are empty. Fails with [`SchedulerError::AlreadyRunning`]
    /// if re-entered.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        if self.running {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.running = true;
        self.stop_requested = false;
        self.high_priority_streak = 0;

        loop {
            let now_ms = self.elapsed_ms();
            for entry in self.wheel.advance_to(now_ms) {
                if self.canceled.remove(&entry.handle) {
                    trace!(handle = entry.handle, "canceled timer entry dropped");
                    continue;
                }
                self.queues[entry.priority.slot()].push_back(QueuedTask {
                    handle: entry.handle,
                    task: entry.task,
                });
            }

            if self.dispatch_one() {
                continue;
            }

            if self.stop_requested && self.queues[0].is_empty() && self.queues[1].is_empty() {
                break;
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        debug!("scheduler loop exited");
        self.running = false;
        Ok(())
    }

    /// Pop and run a single task, honoring priority order and the
    /// starvation guard. Returns `false` if no queue had a task to run.
    fn dispatch_one(&mut self) -> bool {
        if self.high_priority_streak >= HIGH_PRIORITY_STARVATION_LIMIT {
            // Drain one task from *every* non-empty lower queue, not just
            // the first hit, or a steady trickle of Normal work starves Low
            // forever since Normal is always checked first.
            let mut dispatched = false;
            for slot in [2, 3] {
                if let Some(t) = self.queues[slot].pop_front() {
                    self.run_task(t);
                    dispatched = true;
                }
            }
            self.high_priority_streak = 0;
            if dispatched {
                return true;
            }
        }

        for slot in [0, 1] {
            if let Some(t) = self.queues[slot].pop_front() {
                self.high_priority_streak += 1;
                self.run_task(t);
                return true;
            }
        }

        for slot in [2, 3] {
            if let Some(t) = self.queues[slot].pop_front() {
                self.run_task(t);
                return true;
            }
        }

        false
    }

    fn run_task(&mut self, queued: QueuedTask) {
        if self.canceled.remove(&queued.handle) {
            trace!(handle = queued.handle, "canceled task skipped");
            return;
        }
        (queued.task)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn already_running_is_rejected_on_reentry() {
        // Exercised structurally: `running` only flips inside `run`, so a
        // unit test can only assert the guard check directly.
        let mut sched = Scheduler::new();
        sched.running = true;
        assert!(matches!(sched.run(), Err(SchedulerError::AlreadyRunning)));
        sched.running = false;
    }

    #[test]
    fn higher_priority_dispatches_before_lower() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut sched = Scheduler::new();

        let o = order.clone();
        sched.post(Box::new(move || o.lock().unwrap().push("low")), Priority::Low);
        let o = order.clone();
        sched.post(
            Box::new(move || o.lock().unwrap().push("critical")),
            Priority::Critical,
        );
        let o = order.clone();
        sched.post(
            Box::new(move || o.lock().unwrap().push("normal")),
            Priority::Normal,
        );

        sched.dispatch_one();
        sched.dispatch_one();
        sched.dispatch_one();

        assert_eq!(*order.lock().unwrap(), vec!["critical", "normal", "low"]);
    }

    #[test]
    fn cancel_before_dispatch_prevents_execution() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        let r = ran.clone();
        let handle = sched.post(Box::new(move || { r.fetch_add(1, Ordering::SeqCst); }), Priority::Normal);
        sched.cancel(handle);
        sched.dispatch_one();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_dispatch_is_a_harmless_no_op() {
        let mut sched = Scheduler::new();
        let handle = sched.post(Box::new(|| {}), Priority::Normal);
        sched.dispatch_one();
        sched.cancel(handle); // must not panic
    }

    #[test]
    fn starvation_guard_drains_both_normal_and_low() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut sched = Scheduler::new();

        let o = order.clone();
        sched.post(Box::new(move || o.lock().unwrap().push("normal")), Priority::Normal);
        let o = order.clone();
        sched.post(Box::new(move || o.lock().unwrap().push("low")), Priority::Low);

        sched.high_priority_streak = HIGH_PRIORITY_STARVATION_LIMIT;
        // One call past the limit must service both lower queues, not stop
        // after the first (Normal), or Low would starve forever under
        // continuous Critical/High load.
        assert!(sched.dispatch_one());
        assert_eq!(*order.lock().unwrap(), vec!["normal", "low"]);
        assert_eq!(sched.high_priority_streak, 0);
    }

    #[test]
    fn run_drains_critical_and_high_then_stops() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        for _ in 0..5 {
            let r = ran.clone();
            sched.post(Box::new(move || { r.fetch_add(1, Ordering::SeqCst); }), Priority::Critical);
        }
        sched.stop();
        sched.run().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 5);
        assert!(!sched.is_running());
    }
}

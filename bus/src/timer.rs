//! Millisecond-resolution timer wheel backing `post_after`/`post_at`.
//!
//! A single 4096-slot wheel covers roughly four seconds; deadlines further
//! out sit in an overflow list and are cascaded into the wheel once they
//! come within range, which is how wraparound is handled without a
//! multi-level wheel.

use crate::scheduler::{Priority, Task};
use std::collections::VecDeque;

pub(crate) const WHEEL_SIZE: usize = 4096;

pub(crate) struct TimerEntry {
    pub handle: u64,
    pub deadline_ms: u64,
    pub priority: Priority,
    pub task: Task,
}

pub(crate) struct TimerWheel {
    slots: Vec<VecDeque<TimerEntry>>,
    overflow: Vec<TimerEntry>,
    current_tick: u64,
}

impl TimerWheel {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(WHEEL_SIZE);
        for _ in 0..WHEEL_SIZE {
            slots.push(VecDeque::new());
        }
        Self {
            slots,
            overflow: Vec::new(),
            current_tick: 0,
        }
    }

    pub fn insert(&mut self, entry: TimerEntry) {
        let delay = entry.deadline_ms.saturating_sub(self.current_tick);
        if delay < WHEEL_SIZE as u64 {
            let slot = (self.current_tick + delay) as usize % WHEEL_SIZE;
            self.slots[slot].push_back(entry);
        } else {
            self.overflow.push(entry);
        }
    }

    /// Advance the wheel to `now_ms`, returning every entry whose deadline
    /// has passed, in tick order.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<TimerEntry> {
        let mut expired = Vec::new();
        while self.current_tick < now_ms {
            let slot = (self.current_tick as usize) % WHEEL_SIZE;
            expired.extend(self.slots[slot].drain(..));
            self.current_tick += 1;
            self.cascade();
        }
        expired
    }

    fn cascade(&mut self) {
        if self.overflow.is_empty() {
            return;
        }
        let threshold = self.current_tick + WHEEL_SIZE as u64;
        let mut i = 0;
        while i < self.overflow.len() {
            if self.overflow[i].deadline_ms < threshold {
                let entry = self.overflow.swap_remove(i);
                self.insert(entry);
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_entry(handle: u64, deadline_ms: u64) -> TimerEntry {
        TimerEntry {
            handle,
            deadline_ms,
            priority: Priority::Normal,
            task: Box::new(|| {}),
        }
    }

    #[test]
    fn entry_expires_at_its_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.insert(dummy_entry(1, 10));
        assert!(wheel.advance_to(9).is_empty());
        let expired = wheel.advance_to(11);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].handle, 1);
    }

    #[test]
    fn far_future_entry_cascades_into_the_wheel() {
        let mut wheel = TimerWheel::new();
        let far = WHEEL_SIZE as u64 + 100;
        wheel.insert(dummy_entry(2, far));
        assert!(wheel.advance_to(far).is_empty());
        let expired = wheel.advance_to(far + 1);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].handle, 2);
    }

    #[test]
    fn multiple_entries_in_the_same_slot_all_expire() {
        let mut wheel = TimerWheel::new();
        wheel.insert(dummy_entry(1, 5));
        wheel.insert(dummy_entry(2, 5));
        let expired = wheel.advance_to(6);
        let handles: Vec<_> = expired.iter().map(|e| e.handle).collect();
        assert_eq!(handles, vec![1, 2]);
    }
}

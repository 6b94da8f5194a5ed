//! Lock-free MPMC queue (C2), bounded or unbounded, over `crossbeam::channel`.
//!
//! `push` never blocks: on a bounded queue at capacity it returns
//! [`QueueError::Full`] with the item handed back. `pop` is non-blocking;
//! [`MpmcQueue::pop_wait`] blocks with a timeout. `crossbeam::channel` already
//! gives us the linearizability and release/acquire ordering the contract
//! requires, so this type is a thin, named wrapper rather than a new
//! algorithm.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use thiserror::Error;

/// Error returned by [`MpmcQueue::push`].
#[derive(Debug, Error)]
pub enum QueueError<T> {
    /// The queue is bounded and at capacity. The item is returned to the caller.
    #[error("queue is full")]
    Full(T),
    /// Every receiver has been dropped.
    #[error("queue is closed")]
    Closed(T),
}

/// A multi-producer, multi-consumer queue, bounded or unbounded.
///
/// Cloning shares the same underlying channel: every clone is a new handle
/// onto the same queue, which is how cross-loop communication in this
/// codebase is meant to be shared between threads.
#[derive(Clone)]
pub struct MpmcQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> MpmcQueue<T> {
    /// Create a bounded queue with the given capacity.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Create an unbounded queue. `push` on an unbounded queue never returns
    /// `Full`.
    #[must_use]
    pub fn unbounded() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// Push an item. Never blocks.
    pub fn push(&self, item: T) -> Result<(), QueueError<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(v) => QueueError::Full(v),
            TrySendError::Disconnected(v) => QueueError::Closed(v),
        })
    }

    /// Pop an item if one is immediately available.
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Pop an item, blocking up to `timeout` for one to become available.
    pub fn pop_wait(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of items currently queued. Approximate under concurrent access.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// `true` if the queue has no queued items at the instant of the call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_queue_rejects_push_past_capacity() {
        let q = MpmcQueue::bounded(2);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        match q.push(3) {
            Err(QueueError::Full(3)) => {}
            other => panic!("expected Full(3), got {other:?}"),
        }
    }

    #[test]
    fn pop_returns_none_when_empty() {
        let q: MpmcQueue<i32> = MpmcQueue::unbounded();
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn fifo_ordering_preserved_for_single_producer() {
        let q = MpmcQueue::unbounded();
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn pop_wait_times_out_on_empty_queue() {
        let q: MpmcQueue<i32> = MpmcQueue::unbounded();
        let start = std::time::Instant::now();
        assert_eq!(q.pop_wait(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn clone_shares_the_same_queue() {
        let q1 = MpmcQueue::unbounded();
        let q2 = q1.clone();
        q1.push(42).unwrap();
        assert_eq!(q2.pop(), Some(42));
    }
}

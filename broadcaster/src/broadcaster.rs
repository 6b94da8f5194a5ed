//! Fan-out SSE event broadcaster with history replay and per-subscriber
//! backpressure (C10).
//!
//! New code: the teacher only fans out over `tokio::sync::broadcast` in its
//! gateway websocket handler, which lags the whole subscriber on overflow
//! rather than closing just the slow one and has no history/`last_id`
//! replay. Subscriber removal uses an integer handle into a broadcaster-
//! owned slab (per the cyclic-reference design note) instead of a
//! subscriber holding a reference back into the broadcaster.

use crate::event::Event;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

/// Stable handle into the broadcaster's subscriber slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(usize);

/// Outcome of replaying history for a reconnecting subscriber.
#[derive(Debug, Clone)]
pub enum Replay {
    /// Events strictly newer than the requested `last_id`, in id order.
    Events(Vec<Event>),
    /// `last_id` was older than the oldest retained event; the caller must
    /// reconcile from the durable store instead of trusting the replay.
    Gap,
}

/// A freshly registered subscriber: its handle, receive end, and the
/// replay computed at subscribe time.
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub receiver: Receiver<Event>,
    pub replay: Replay,
}

/// Point-in-time broadcaster counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcasterStats {
    pub subscriber_count: usize,
    pub history_len: usize,
    pub next_id: u64,
    pub slow_consumer_drops: u64,
}

struct Inner {
    next_id: u64,
    history: VecDeque<Event>,
    history_capacity: usize,
    subscriber_buffer: usize,
    subscribers: Vec<Option<Sender<Event>>>,
    slow_consumer_drops: u64,
}

/// Single-process SSE fan-out broadcaster.
pub struct Broadcaster {
    inner: Mutex<Inner>,
}

impl Broadcaster {
    #[must_use]
    pub fn new(history_capacity: usize, subscriber_buffer: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                history: VecDeque::with_capacity(history_capacity),
                history_capacity,
                subscriber_buffer,
                subscribers: Vec::new(),
                slow_consumer_drops: 0,
            }),
        }
    }

    /// Register a subscriber and compute its replay against `last_id`.
    pub fn subscribe(&self, last_id: Option<u64>) -> Subscription {
        let mut inner = self.inner.lock();
        let (tx, rx) = channel::bounded(inner.subscriber_buffer);

        let slot = inner.subscribers.iter().position(Option::is_none);
        let handle = match slot {
            Some(i) => {
                inner.subscribers[i] = Some(tx);
                i
            }
            None => {
                inner.subscribers.push(Some(tx));
                inner.subscribers.len() - 1
            }
        };

        let replay = match last_id {
            None => Replay::Events(Vec::new()),
            Some(last_id) => {
                let oldest = inner.history.front().map(|e| e.id);
                if oldest.is_some_and(|oldest| last_id < oldest) {
                    Replay::Gap
                } else {
                    Replay::Events(inner.history.iter().filter(|e| e.id > last_id).cloned().collect())
                }
            }
        };

        Subscription {
            handle: SubscriptionHandle(handle),
            receiver: rx,
            replay,
        }
    }

    /// Remove a subscriber explicitly (connection closed by the client).
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.subscribers.get_mut(handle.0) {
            *slot = None;
        }
    }

    /// Assign the next id, append to history, and deliver to every live
    /// subscriber before returning.
    pub fn broadcast(&self, payload: Value) -> Event {
        let mut inner = self.inner.lock();
        Self::broadcast_locked(&mut inner, payload)
    }

    /// Broadcast a batch under a single lock acquisition, preserving the
    /// cross-subscriber ordering guarantee across the whole batch.
    pub fn broadcast_batch(&self, payloads: Vec<Value>) -> Vec<Event> {
        let mut inner = self.inner.lock();
        payloads
            .into_iter()
            .map(|payload| Self::broadcast_locked(&mut inner, payload))
            .collect()
    }

    fn broadcast_locked(inner: &mut Inner, payload: Value) -> Event {
        let event = Event { id: inner.next_id, payload };
        inner.next_id += 1;

        if inner.history.len() == inner.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(event.clone());

        for slot in &mut inner.subscribers {
            if let Some(sender) = slot {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("closing slow subscriber: buffer full");
                        *slot = None;
                        inner.slow_consumer_drops += 1;
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        *slot = None;
                    }
                }
            }
        }

        event
    }

    /// Events strictly newer than `last_id`, in id order.
    #[must_use]
    pub fn get_history(&self, last_id: Option<u64>) -> Vec<Event> {
        let inner = self.inner.lock();
        match last_id {
            None => inner.history.iter().cloned().collect(),
            Some(last_id) => inner.history.iter().filter(|e| e.id > last_id).cloned().collect(),
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscribers.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn stats(&self) -> BroadcasterStats {
        let inner = self.inner.lock();
        BroadcasterStats {
            subscriber_count: inner.subscribers.iter().filter(|s| s.is_some()).count(),
            history_len: inner.history.len(),
            next_id: inner.next_id,
            slow_consumer_drops: inner.slow_consumer_drops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcaster_fan_out_seed_scenario() {
        let broadcaster = Broadcaster::new(100, 16);
        broadcaster.broadcast_batch(vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);

        let s1 = broadcaster.subscribe(Some(5));
        let s2 = broadcaster.subscribe(None);

        let ids = [6u64, 7, 8];
        for id in ids {
            broadcaster.broadcast(json!(id));
        }

        let s1_ids: Vec<u64> = s1.receiver.try_iter().map(|e| e.id).collect();
        let s2_ids: Vec<u64> = s2.receiver.try_iter().map(|e| e.id).collect();
        assert_eq!(s1_ids, vec![6, 7, 8]);
        assert_eq!(s2_ids, vec![6, 7, 8]);

        broadcaster.unsubscribe(s2.handle);
        broadcaster.broadcast(json!(9));

        let s1_ids: Vec<u64> = s1.receiver.try_iter().map(|e| e.id).collect();
        assert_eq!(s1_ids, vec![9]);
        assert_eq!(broadcaster.subscription_count(), 1);
    }

    #[test]
    fn replay_returns_gap_when_last_id_precedes_history() {
        let broadcaster = Broadcaster::new(2, 16);
        broadcaster.broadcast_batch(vec![json!(1), json!(2), json!(3)]);
        let sub = broadcaster.subscribe(Some(0));
        assert!(matches!(sub.replay, Replay::Gap));
    }

    #[test]
    fn replay_returns_events_newer_than_last_id() {
        let broadcaster = Broadcaster::new(10, 16);
        broadcaster.broadcast_batch(vec![json!("a"), json!("b"), json!("c")]);
        let sub = broadcaster.subscribe(Some(1));
        match sub.replay {
            Replay::Events(events) => assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]),
            Replay::Gap => panic!("expected events, got gap"),
        }
    }

    #[test]
    fn slow_consumer_is_closed_on_buffer_overflow() {
        let broadcaster = Broadcaster::new(100, 1);
        let sub = broadcaster.subscribe(None);
        broadcaster.broadcast(json!(1));
        broadcaster.broadcast(json!(2));
        assert_eq!(broadcaster.subscription_count(), 0);
        assert_eq!(broadcaster.stats().slow_consumer_drops, 1);
        drop(sub.receiver);
    }
}

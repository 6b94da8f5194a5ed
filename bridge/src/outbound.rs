//! Bounded outbound buffer implementing the class-based backpressure drop
//! policy: when the pipe would block, `market` events are dropped before
//! `fill`, `order_update`, or `account`.

use crate::event::{Event, EventClass};
use std::collections::VecDeque;

/// Counters for the backpressure policy, surfaced via the engine's health
/// endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboundStats {
    pub dropped_market: u64,
    pub dropped_essential: u64,
}

/// A bounded FIFO of pending outbound lines. `push` never blocks: once the
/// buffer is full it evicts the oldest droppable event to make room, or
/// drops the incoming event if there is nothing droppable left to evict.
pub struct OutboundBuffer {
    capacity: usize,
    queue: VecDeque<Event>,
    stats: OutboundStats,
}

impl OutboundBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
            stats: OutboundStats::default(),
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.queue.len() < self.capacity {
            self.queue.push_back(event);
            return;
        }

        if event.class() == EventClass::Droppable {
            self.stats.dropped_market += 1;
            return;
        }

        match self.queue.iter().position(|e| e.class() == EventClass::Droppable) {
            Some(index) => {
                self.queue.remove(index);
                self.stats.dropped_market += 1;
                self.queue.push_back(event);
            }
            None => {
                self.stats.dropped_essential += 1;
            }
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub const fn stats(&self) -> OutboundStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(symbol: &str) -> Event {
        Event::Market {
            symbol: symbol.to_string(),
            best_bid: None,
            best_ask: None,
            timestamp: "t".to_string(),
        }
    }

    fn fill(id: &str) -> Event {
        Event::Fill {
            client_order_id: id.to_string(),
            symbol: "SYM_1".to_string(),
            qty: 1.0,
            price: 50.0,
            timestamp: "t".to_string(),
        }
    }

    #[test]
    fn market_is_dropped_before_fill_on_overflow() {
        let mut buf = OutboundBuffer::new(2);
        buf.push(market("a"));
        buf.push(market("b"));
        buf.push(fill("o1"));

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.stats().dropped_market, 1);
        assert_eq!(buf.pop(), Some(market("b")));
        assert_eq!(buf.pop(), Some(fill("o1")));
    }

    #[test]
    fn essential_events_are_dropped_only_as_a_last_resort() {
        let mut buf = OutboundBuffer::new(1);
        buf.push(fill("o1"));
        buf.push(fill("o2"));
        assert_eq!(buf.stats().dropped_essential, 1);
        assert_eq!(buf.pop(), Some(fill("o1")));
    }
}

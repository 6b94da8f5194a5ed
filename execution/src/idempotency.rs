//! Bounded TTL map of recently-seen client order ids, so re-placing an
//! accepted or open order returns the original ack instead of submitting a
//! duplicate.

use crate::adapter::Ack;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Maps `client_order_id` to the ack it was first assigned, expiring
/// entries after `ttl`.
pub struct IdempotencyMap {
    entries: FxHashMap<String, (Ack, Instant)>,
    ttl: Duration,
}

impl IdempotencyMap {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: FxHashMap::default(),
            ttl,
        }
    }

    /// Look up a still-live ack for `client_order_id`, purging expired
    /// entries first.
    pub fn get(&mut self, client_order_id: &str) -> Option<Ack> {
        self.purge_expired();
        self.entries.get(client_order_id).map(|(ack, _)| ack.clone())
    }

    pub fn insert(&mut self, client_order_id: String, ack: Ack) {
        self.entries.insert(client_order_id, (ack, Instant::now()));
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() < ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(id: &str) -> Ack {
        Ack {
            client_order_id: id.to_string(),
            venue_order_id: format!("V-{id}"),
        }
    }

    #[test]
    fn returns_the_same_ack_for_a_repeated_id() {
        let mut map = IdempotencyMap::new(Duration::from_secs(60));
        map.insert("A".to_string(), ack("A"));
        assert_eq!(map.get("A"), Some(ack("A")));
        assert_eq!(map.get("B"), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut map = IdempotencyMap::new(Duration::from_millis(10));
        map.insert("A".to_string(), ack("A"));
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(map.get("A"), None);
    }
}

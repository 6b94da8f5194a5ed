//! Hand-rolled token-bucket rate limiter, per client identifier (C13).
//!
//! New code: the teacher's `rate_limiter.rs` wraps the `governor` crate,
//! which only exposes an allow/deny bool. The `{allowed, retry_after_ms,
//! remaining, reset_at_ms}` contract needs the bucket's internal state, so
//! this rolls a small bucket by hand instead.

use common::constants::{RATE_LIMITER_CLEANUP_INTERVAL_SECS, RATE_LIMITER_MAX_ENTRIES};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Result of a single `check` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub retry_after_ms: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(capacity: u64, refill_per_sec: u64, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn consume(&mut self, cost: f64, now: Instant) -> RateLimitResult {
        self.refill(now);
        self.last_seen = now;

        let millis_to_full = |deficit: f64| -> u64 {
            if self.refill_per_sec <= 0.0 {
                u64::MAX
            } else {
                ((deficit / self.refill_per_sec) * 1000.0).ceil().max(0.0) as u64
            }
        };

        if self.tokens >= cost {
            self.tokens -= cost;
            RateLimitResult {
                allowed: true,
                retry_after_ms: 0,
                remaining: self.tokens.floor() as u64,
                reset_at_ms: millis_to_full(self.capacity - self.tokens),
            }
        } else {
            let deficit = cost - self.tokens;
            RateLimitResult {
                allowed: false,
                retry_after_ms: millis_to_full(deficit),
                remaining: self.tokens.floor() as u64,
                reset_at_ms: millis_to_full(self.capacity - self.tokens),
            }
        }
    }
}

/// Per-route override of the default capacity/refill rate.
#[derive(Debug, Clone, Copy)]
pub struct RouteLimit {
    pub capacity: u64,
    pub refill_per_sec: u64,
}

/// Token bucket per client identifier (IP, or API key id when authenticated),
/// with optional per-route overrides. Buckets unseen for `cleanup_interval`
/// are evicted on `cleanup`.
pub struct RateLimiter {
    default_capacity: u64,
    default_refill_per_sec: u64,
    route_overrides: FxHashMap<&'static str, RouteLimit>,
    buckets: parking_lot::Mutex<FxHashMap<String, Bucket>>,
    cleanup_interval: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(default_capacity: u64, default_refill_per_sec: u64) -> Self {
        Self {
            default_capacity,
            default_refill_per_sec,
            route_overrides: FxHashMap::default(),
            buckets: parking_lot::Mutex::new(FxHashMap::default()),
            cleanup_interval: Duration::from_secs(RATE_LIMITER_CLEANUP_INTERVAL_SECS),
        }
    }

    #[must_use]
    pub fn with_route_override(mut self, path: &'static str, limit: RouteLimit) -> Self {
        self.route_overrides.insert(path, limit);
        self
    }

    /// Check and consume `cost` tokens (default 1) for `client_id` on `route`.
    pub fn check(&self, client_id: &str, route: &str, cost: u64) -> RateLimitResult {
        let (capacity, refill_per_sec) = self
            .route_overrides
            .get(route)
            .map(|r| (r.capacity, r.refill_per_sec))
            .unwrap_or((self.default_capacity, self.default_refill_per_sec));

        let now = Instant::now();
        let key = format!("{client_id}:{route}");
        let mut buckets = self.buckets.lock();

        if buckets.len() >= RATE_LIMITER_MAX_ENTRIES && !buckets.contains_key(&key) {
            self.evict_stale_locked(&mut buckets, now);
        }

        let bucket = buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(capacity, refill_per_sec, now));
        bucket.consume(cost as f64, now)
    }

    /// Evict buckets unseen for `cleanup_interval`. Call periodically from a
    /// background task; also invoked opportunistically when near capacity.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        self.evict_stale_locked(&mut buckets, now);
    }

    fn evict_stale_locked(&self, buckets: &mut FxHashMap<String, Bucket>, now: Instant) {
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < self.cleanup_interval);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(10, 1);
        for _ in 0..10 {
            let result = limiter.check("client-a", "/api/order", 1);
            assert!(result.allowed);
        }
        let result = limiter.check("client-a", "/api/order", 1);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        // capacity 10, refill 1/s: the 11th request is short by one token,
        // so retry_after_ms should land close to 1000ms.
        assert!((900..=1100).contains(&result.retry_after_ms), "retry_after_ms = {}", result.retry_after_ms);
    }

    #[test]
    fn distinct_clients_have_independent_buckets() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check("a", "/api/order", 1).allowed);
        assert!(limiter.check("b", "/api/order", 1).allowed);
        assert!(!limiter.check("a", "/api/order", 1).allowed);
    }

    #[test]
    fn route_override_applies_independently_of_default() {
        let limiter = RateLimiter::new(100, 100).with_route_override(
            "/api/order",
            RouteLimit { capacity: 1, refill_per_sec: 1 },
        );
        assert!(limiter.check("a", "/api/order", 1).allowed);
        assert!(!limiter.check("a", "/api/order", 1).allowed);
        assert!(limiter.check("a", "/api/market", 1).allowed);
    }

    #[test]
    fn cleanup_evicts_only_stale_buckets() {
        let limiter = RateLimiter::new(5, 5);
        limiter.check("a", "/api/order", 1);
        assert_eq!(limiter.len(), 1);
        limiter.cleanup();
        assert_eq!(limiter.len(), 1, "bucket just touched must survive cleanup");
    }
}

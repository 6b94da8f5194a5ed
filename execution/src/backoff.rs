//! Exponential backoff with full jitter for retryable venue rejects
//! (`RateLimited`, `VenueDown`): base 100ms, factor 2, cap 30s.

use common::constants::{BACKOFF_BASE_MS, BACKOFF_CAP_MS, BACKOFF_FACTOR};
use rand::Rng;
use std::time::Duration;

/// Tracks the retry attempt count for one in-flight operation and produces
/// the next jittered delay.
pub struct Backoff {
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Delay before the next retry, with full jitter: a uniform random
    /// value in `[0, capped_exponential_delay]`.
    pub fn next_delay(&mut self, rng: &mut impl Rng) -> Duration {
        let exp = BACKOFF_FACTOR.checked_pow(self.attempt).unwrap_or(u32::MAX);
        let raw_ms = BACKOFF_BASE_MS.saturating_mul(u64::from(exp));
        let capped_ms = raw_ms.min(BACKOFF_CAP_MS);
        self.attempt = self.attempt.saturating_add(1);
        let jittered_ms = if capped_ms == 0 { 0 } else { rng.gen_range(0..=capped_ms) };
        Duration::from_millis(jittered_ms)
    }

    /// Reset after a successful attempt.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn delay_never_exceeds_the_cap() {
        let mut backoff = Backoff::new();
        let mut rng = thread_rng();
        for _ in 0..20 {
            let delay = backoff.next_delay(&mut rng);
            assert!(delay.as_millis() as u64 <= BACKOFF_CAP_MS);
        }
    }

    #[test]
    fn reset_restarts_the_attempt_counter() {
        let mut backoff = Backoff::new();
        let mut rng = thread_rng();
        backoff.next_delay(&mut rng);
        backoff.next_delay(&mut rng);
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}

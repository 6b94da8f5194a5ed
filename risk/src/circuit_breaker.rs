//! Three-state circuit breaker for the execution path (C9).

use std::time::{Duration, Instant};

/// Breaker state. `HalfOpen` allows exactly one trial attempt before
/// resolving back to `Closed` or `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Trips to `Open` after `trip_threshold` consecutive failures, a forced
/// trip (loss breach, kill switch), or a failed `HalfOpen` trial. Cooldown
/// doubles on each re-trip from `HalfOpen`, capped at `max_cooldown`.
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    trip_threshold: u32,
    initial_cooldown: Duration,
    current_cooldown: Duration,
    max_cooldown: Duration,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(trip_threshold: u32, initial_cooldown: Duration, max_cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trip_threshold,
            initial_cooldown,
            current_cooldown: initial_cooldown,
            max_cooldown,
            opened_at: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.consecutive_failures = 0;
    }

    /// Whether a place attempt is currently allowed. In `Open`, transitions
    /// to `HalfOpen` and allows the trial attempt once the cooldown elapses.
    pub fn allow_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.current_cooldown {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful adapter call (place ack, or a `HalfOpen` trial
    /// that went through).
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state != CircuitState::Closed {
            self.state = CircuitState::Closed;
            self.current_cooldown = self.initial_cooldown;
        }
    }

    /// Record a retryable adapter failure (`VenueDown`).
    pub fn on_failure(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.trip_threshold {
                    self.trip();
                }
            }
            CircuitState::HalfOpen => {
                self.current_cooldown = (self.current_cooldown * 2).min(self.max_cooldown);
                self.trip();
            }
            CircuitState::Open => {}
        }
    }

    /// Force an immediate trip, bypassing the failure threshold: realized
    /// loss breach or kill switch.
    pub fn force_trip(&mut self) {
        self.trip();
    }

    /// Operator-initiated reset back to `Closed` with the cooldown cleared.
    pub fn manual_reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.current_cooldown = self.initial_cooldown;
        self.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_consecutive_failures_trip_the_breaker() {
        let mut breaker = CircuitBreaker::new(5, Duration::from_millis(10), Duration::from_secs(60));
        for _ in 0..4 {
            breaker.on_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_attempt());
    }

    #[test]
    fn cooldown_then_half_open_then_close_seed_scenario() {
        let mut breaker = CircuitBreaker::new(5, Duration::from_millis(5), Duration::from_secs(60));
        for _ in 0..5 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.allow_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_half_open_trial_doubles_cooldown_and_reopens() {
        let mut breaker = CircuitBreaker::new(5, Duration::from_millis(5), Duration::from_secs(60));
        for _ in 0..5 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.allow_attempt());
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.current_cooldown, Duration::from_millis(10));
    }

    #[test]
    fn manual_reset_clears_state_and_cooldown() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(5), Duration::from_secs(60));
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.manual_reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_attempt());
    }
}

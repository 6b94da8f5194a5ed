//! Core fixed-point and identifier types shared across the data plane.

use crate::constants::SCALE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol identifier for a tradable instrument.
///
/// Stored as an interned `u32` id rather than a `String` so order book and
/// position lookups stay allocation-free on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub u32);

impl Symbol {
    /// Create a new symbol from a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYM_{}", self.0)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer.
    Buy,
    /// Seller.
    Sell,
}

impl Side {
    /// The opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Fixed-point price, stored as `i64` ticks (1 tick = 0.0001 units).
///
/// All arithmetic is done in ticks to keep order book and P&L computations
/// deterministic across platforms; floating point is only used at the
/// external API boundary (`as_f64` / `new`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Px(i64);

impl Px {
    /// Zero price.
    pub const ZERO: Self = Self(0);

    /// Construct from a floating point value, rounding to the nearest tick.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self((value * SCALE as f64).round() as i64)
    }

    /// Construct directly from ticks.
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw tick value.
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Value as `f64`, for display and external APIs only.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = (self.0 % SCALE).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

/// Fixed-point quantity, stored as `i64` ticks (1 tick = 0.0001 units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qty(i64);

impl Qty {
    /// Zero quantity.
    pub const ZERO: Self = Self(0);

    /// Construct from a floating point value, rounding to the nearest tick.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self((value * SCALE as f64).round() as i64)
    }

    /// Construct directly from ticks.
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw tick value.
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Value as `f64`, for display and external APIs only.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// `true` when this quantity is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = (self.0 % SCALE).abs();
        write!(f, "{whole}.{frac:04}")
    }
}

impl std::ops::Add for Qty {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Qty {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// Nanosecond timestamp since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ts(pub u64);

impl Ts {
    /// Construct from a raw nanosecond count.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Current wall-clock time. Not called from any deterministic test path.
    #[must_use]
    pub fn now() -> Self {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self(dur.as_nanos() as u64)
    }

    /// Format as an ISO-8601 UTC timestamp with millisecond precision,
    /// matching the engine bridge wire format.
    #[must_use]
    pub fn to_iso8601_millis(self) -> String {
        let millis = (self.0 / 1_000_000) as i64;
        let dt = chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default();
        dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_round_trips_through_ticks() {
        let p = Px::new(42000.1234);
        assert_eq!(p.ticks(), 420001234);
        assert!((p.as_f64() - 42000.1234).abs() < 1e-9);
    }

    #[test]
    fn qty_add_sub() {
        let a = Qty::new(1.5);
        let b = Qty::new(0.5);
        assert_eq!((a + b).as_f64(), 2.0);
        assert_eq!((a - b).as_f64(), 1.0);
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn ts_iso8601_formatting() {
        let ts = Ts::from_nanos(1_705_315_800_123_000_000);
        assert_eq!(ts.to_iso8601_millis(), "2024-01-15T10:30:00.123Z");
    }
}

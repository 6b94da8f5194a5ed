//! Sequence-gapped order book (C4).
//!
//! Bid and ask ladders are `BTreeMap`s keyed by price, which gives coalesced
//! price levels "for free" (`insert` on an existing key replaces the
//! quantity) and an ordered iteration the top-of-book/spread queries walk
//! from either end. The book is single-writer; readers observe a cloned
//! snapshot view rather than locking the live structure.

use common::types::{Px, Qty, Side, Symbol, Ts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Errors returned by book mutation when the input itself is invalid,
/// independent of sequencing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("invalid level: price must be positive, got {price}")]
    InvalidLevel { price: Px },
}

/// Whether the book is accepting deltas normally or waiting for a fresh
/// snapshot after a sequence gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    Ready,
    AwaitingSnapshot,
}

/// Result of applying a snapshot or delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was applied and `sequence` advanced.
    Applied,
    /// `seq` is ahead of `sequence + 1`; the book entered `AwaitingSnapshot`.
    GapDetected { expected: u64, got: u64 },
    /// `seq <= sequence`; a replayed delta, silently dropped.
    DroppedReplayed,
    /// The book is `AwaitingSnapshot` and discards deltas until a new
    /// snapshot arrives.
    DiscardedAwaitingSnapshot,
}

/// Top-of-book view: best bid/ask, either of which may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: Option<Px>,
    pub best_ask: Option<Px>,
}

/// A single symbol's order book.
pub struct OrderBook {
    symbol: Symbol,
    bids: BTreeMap<Px, Qty>,
    asks: BTreeMap<Px, Qty>,
    sequence: u64,
    snapshot_sequence: u64,
    state: BookState,
    ts: Ts,
}

impl OrderBook {
    /// Create an empty book for `symbol`, awaiting its first snapshot.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            sequence: 0,
            snapshot_sequence: 0,
            state: BookState::AwaitingSnapshot,
            ts: Ts::from_nanos(0),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn snapshot_sequence(&self) -> u64 {
        self.snapshot_sequence
    }

    #[must_use]
    pub fn state(&self) -> BookState {
        self.state
    }

    /// Replace both ladders atomically and reset `sequence` and
    /// `snapshot_sequence` to `seq`.
    pub fn apply_snapshot(
        &mut self,
        bids: &[(Px, Qty)],
        asks: &[(Px, Qty)],
        seq: u64,
        ts: Ts,
    ) -> Result<(), BookError> {
        for (price, _) in bids.iter().chain(asks.iter()) {
            if price.ticks() <= 0 {
                return Err(BookError::InvalidLevel { price: *price });
            }
        }
        self.bids = bids.iter().copied().filter(|(_, q)| !q.is_zero()).collect();
        self.asks = asks.iter().copied().filter(|(_, q)| !q.is_zero()).collect();
        self.sequence = seq;
        self.snapshot_sequence = seq;
        self.state = BookState::Ready;
        self.ts = ts;
        self.warn_if_crossed();
        Ok(())
    }

    /// Apply a single level update. `qty == 0` removes the level.
    pub fn apply_delta(
        &mut self,
        side: Side,
        price: Px,
        qty: Qty,
        seq: u64,
        ts: Ts,
    ) -> Result<ApplyOutcome, BookError> {
        if price.ticks() <= 0 {
            return Err(BookError::InvalidLevel { price });
        }

        if seq <= self.sequence {
            return Ok(ApplyOutcome::DroppedReplayed);
        }

        if self.state == BookState::AwaitingSnapshot {
            return Ok(ApplyOutcome::DiscardedAwaitingSnapshot);
        }

        if seq > self.sequence + 1 {
            self.state = BookState::AwaitingSnapshot;
            return Ok(ApplyOutcome::GapDetected {
                expected: self.sequence + 1,
                got: seq,
            });
        }

        let ladder = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if qty.is_zero() {
            ladder.remove(&price);
        } else {
            ladder.insert(price, qty);
        }
        self.sequence = seq;
        self.ts = ts;
        self.warn_if_crossed();
        Ok(ApplyOutcome::Applied)
    }

    /// Best (highest) bid price, if any levels exist.
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.bids.keys().next_back().copied()
    }

    /// Best (lowest) ask price, if any levels exist.
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.asks.keys().next().copied()
    }

    #[must_use]
    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
        }
    }

    /// Mid price, defined only when both sides are present.
    #[must_use]
    pub fn mid(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Px::from_ticks((bid.ticks() + ask.ticks()) / 2)),
            _ => None,
        }
    }

    /// Spread in ticks, defined only when both sides are present.
    #[must_use]
    pub fn spread_ticks(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.ticks() - bid.ticks()),
            _ => None,
        }
    }

    /// `true` when the best bid is at or above the best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    fn warn_if_crossed(&self) {
        if self.is_crossed() {
            warn!(
                symbol = %self.symbol,
                sequence = self.sequence,
                bid = ?self.best_bid(),
                ask = ?self.best_ask(),
                "order book crossed after apply"
            );
        }
    }

    /// Quantity-weighted imbalance between the best bid and ask, in
    /// `[-1.0, 1.0]`; `0.0` when either side is empty.
    #[must_use]
    pub fn imbalance(&self) -> f64 {
        let bid_qty = self.bids.values().next_back().copied().unwrap_or(Qty::ZERO);
        let ask_qty = self.asks.values().next().copied().unwrap_or(Qty::ZERO);
        let total = bid_qty.as_f64() + ask_qty.as_f64();
        if total <= 0.0 {
            0.0
        } else {
            (bid_qty.as_f64() - ask_qty.as_f64()) / total
        }
    }

    /// Discard all levels and return to `AwaitingSnapshot`.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.state = BookState::AwaitingSnapshot;
    }

    #[must_use]
    pub fn bid_levels(&self) -> Vec<(Px, Qty)> {
        self.bids.iter().rev().map(|(p, q)| (*p, *q)).collect()
    }

    #[must_use]
    pub fn ask_levels(&self) -> Vec<(Px, Qty)> {
        self.asks.iter().map(|(p, q)| (*p, *q)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> Symbol {
        Symbol::new(1)
    }

    #[test]
    fn book_reconstruction_seed_scenario() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(
            &[(Px::new(100.0), Qty::new(1.0)), (Px::new(99.0), Qty::new(2.0))],
            &[(Px::new(101.0), Qty::new(1.0))],
            10,
            Ts::from_nanos(0),
        )
        .unwrap();

        let outcome = book
            .apply_delta(Side::Buy, Px::new(100.0), Qty::ZERO, 11, Ts::from_nanos(1))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(book.best_bid(), Some(Px::new(99.0)));
        assert_eq!(book.sequence(), 11);

        let outcome = book
            .apply_delta(Side::Sell, Px::new(101.0), Qty::new(2.0), 13, Ts::from_nanos(2))
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::GapDetected {
                expected: 12,
                got: 13
            }
        );
        assert_eq!(book.state(), BookState::AwaitingSnapshot);
    }

    #[test]
    fn deltas_discarded_while_awaiting_snapshot() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(&[], &[], 1, Ts::from_nanos(0)).unwrap();
        book.apply_delta(Side::Buy, Px::new(1.0), Qty::new(1.0), 3, Ts::from_nanos(0))
            .unwrap(); // gap -> AwaitingSnapshot
        let outcome = book
            .apply_delta(Side::Buy, Px::new(1.0), Qty::new(1.0), 4, Ts::from_nanos(0))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::DiscardedAwaitingSnapshot);
    }

    #[test]
    fn replayed_delta_is_silently_dropped() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(&[], &[], 5, Ts::from_nanos(0)).unwrap();
        let outcome = book
            .apply_delta(Side::Buy, Px::new(1.0), Qty::new(1.0), 5, Ts::from_nanos(0))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::DroppedReplayed);
    }

    #[test]
    fn levels_at_the_same_price_are_coalesced() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(&[(Px::new(100.0), Qty::new(1.0))], &[], 1, Ts::from_nanos(0))
            .unwrap();
        book.apply_delta(Side::Buy, Px::new(100.0), Qty::new(5.0), 2, Ts::from_nanos(0))
            .unwrap();
        assert_eq!(book.bid_levels(), vec![(Px::new(100.0), Qty::new(5.0))]);
    }

    #[test]
    fn spread_and_mid_undefined_with_one_side_empty() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(&[(Px::new(100.0), Qty::new(1.0))], &[], 1, Ts::from_nanos(0))
            .unwrap();
        assert_eq!(book.spread_ticks(), None);
        assert_eq!(book.mid(), None);
    }

    #[test]
    fn imbalance_favors_heavier_side() {
        let mut book = OrderBook::new(sym());
        book.apply_snapshot(
            &[(Px::new(100.0), Qty::new(3.0))],
            &[(Px::new(101.0), Qty::new(1.0))],
            1,
            Ts::from_nanos(0),
        )
        .unwrap();
        assert!(book.imbalance() > 0.0);
    }

    #[test]
    fn invalid_level_price_is_rejected() {
        let mut book = OrderBook::new(sym());
        let err = book
            .apply_delta(Side::Buy, Px::from_ticks(0), Qty::new(1.0), 1, Ts::from_nanos(0))
            .unwrap_err();
        assert!(matches!(err, BookError::InvalidLevel { .. }));
    }
}

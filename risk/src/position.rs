//! Per-symbol position and realized/unrealized P&L (C8).

use common::constants::SCALE;
use common::types::{Px, Side, Symbol};
use rustc_hash::FxHashMap;

/// Signed position in one symbol. `avg_price` is only meaningful while
/// `size != 0`; closing a position resets it to [`Px::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    size_ticks: i64,
    avg_price: Px,
    pub realized_pnl: f64,
}

impl Position {
    #[must_use]
    pub const fn flat(symbol: Symbol) -> Self {
        Self {
            symbol,
            size_ticks: 0,
            avg_price: Px::ZERO,
            realized_pnl: 0.0,
        }
    }

    #[must_use]
    pub fn size(&self) -> f64 {
        self.size_ticks as f64 / SCALE as f64
    }

    #[must_use]
    pub const fn avg_price(&self) -> Px {
        self.avg_price
    }

    fn set_size(&mut self, size: f64) {
        self.size_ticks = (size * SCALE as f64).round() as i64;
        if self.size_ticks == 0 {
            self.avg_price = Px::ZERO;
        }
    }

    /// Apply a fill, following the buy/sell formulas for opening, adding,
    /// reducing, and flip-through-flat.
    pub fn apply_fill(&mut self, side: Side, qty: f64, price: f64) {
        match side {
            Side::Buy => self.apply_buy(qty, price),
            Side::Sell => self.apply_sell(qty, price),
        }
    }

    fn apply_buy(&mut self, q: f64, p: f64) {
        let s = self.size();
        let a = self.avg_price.as_f64();
        if s >= 0.0 {
            let new_size = s + q;
            let new_avg = if new_size != 0.0 { (a * s + p * q) / new_size } else { 0.0 };
            self.set_size(new_size);
            self.avg_price = Px::new(new_avg);
        } else if q <= -s {
            self.realized_pnl += q * (a - p);
            self.set_size(s + q);
        } else {
            let abs_s = -s;
            self.realized_pnl += abs_s * (a - p);
            self.set_size(q - abs_s);
            self.avg_price = Px::new(p);
        }
    }

    fn apply_sell(&mut self, q: f64, p: f64) {
        let s = self.size();
        let a = self.avg_price.as_f64();
        if s <= 0.0 {
            let new_size = s - q;
            let new_avg = if new_size != 0.0 { (a * -s + p * q) / -new_size } else { 0.0 };
            self.set_size(new_size);
            self.avg_price = Px::new(new_avg);
        } else if q <= s {
            self.realized_pnl += q * (p - a);
            self.set_size(s - q);
        } else {
            self.realized_pnl += s * (p - a);
            self.set_size(s - q);
            self.avg_price = Px::new(p);
        }
    }

    /// Mark-to-market unrealized P&L; zero while flat.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Px) -> f64 {
        if self.size_ticks == 0 {
            0.0
        } else {
            self.size() * (mark.as_f64() - self.avg_price.as_f64())
        }
    }
}

/// Tracks one [`Position`] per symbol, created lazily on first fill.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: FxHashMap<Symbol, Position>,
}

impl PositionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_fill(&mut self, symbol: Symbol, side: Side, qty: f64, price: f64) -> Position {
        let position = self.positions.entry(symbol).or_insert_with(|| Position::flat(symbol));
        position.apply_fill(side, qty, price);
        *position
    }

    #[must_use]
    pub fn get(&self, symbol: Symbol) -> Option<&Position> {
        self.positions.get(&symbol)
    }

    #[must_use]
    pub fn total_realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }
}

//! Pre-trade risk checks wired to the circuit breaker and position book (C9).

use crate::circuit_breaker::CircuitBreaker;
use crate::limits::{RiskLimits, RiskReject, SymbolGate};
use crate::position::PositionBook;
use common::types::{Px, Qty, Side, Symbol};
use rustc_hash::FxHashMap;
use std::time::Duration;
use thiserror::Error;

/// Everything a pre-trade check can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RiskCheckError {
    #[error("circuit open")]
    CircuitOpen,
    #[error(transparent)]
    Reject(#[from] RiskReject),
}

/// Ties the position book, configured limits, symbol gate, and circuit
/// breaker into a single pre-trade check and post-trade feedback surface.
pub struct RiskEngine {
    limits: RiskLimits,
    gate: SymbolGate,
    positions: PositionBook,
    circuit: CircuitBreaker,
    open_orders: FxHashMap<Symbol, u32>,
    daily_realized_loss: f64,
    weekly_realized_loss: f64,
}

impl RiskEngine {
    #[must_use]
    pub fn new(limits: RiskLimits, trip_threshold: u32, initial_cooldown_ms: u64, max_cooldown_ms: u64) -> Self {
        Self {
            limits,
            gate: SymbolGate::new(),
            positions: PositionBook::new(),
            circuit: CircuitBreaker::new(
                trip_threshold,
                Duration::from_millis(initial_cooldown_ms),
                Duration::from_millis(max_cooldown_ms),
            ),
            open_orders: FxHashMap::default(),
            daily_realized_loss: 0.0,
            weekly_realized_loss: 0.0,
        }
    }

    #[must_use]
    pub fn gate_mut(&mut self) -> &mut SymbolGate {
        &mut self.gate
    }

    #[must_use]
    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    #[must_use]
    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// Run every pre-trade rule in order, returning the first failure.
    pub fn check_order(
        &mut self,
        symbol: Symbol,
        _side: Side,
        qty: Qty,
        price: Option<Px>,
    ) -> Result<(), RiskCheckError> {
        if self.gate.kill_switch() {
            return Err(RiskCheckError::Reject(RiskReject::KillSwitchActive));
        }
        if !self.circuit.allow_attempt() {
            return Err(RiskCheckError::CircuitOpen);
        }
        if !self.gate.is_enabled(symbol) {
            return Err(RiskCheckError::Reject(RiskReject::SymbolDisabled));
        }

        let notional = price.map_or(0.0, |p| p.as_f64() * qty.as_f64());
        if notional > self.limits.max_order_notional {
            return Err(RiskCheckError::Reject(RiskReject::MaxOrderNotionalExceeded));
        }

        if let Some(position) = self.positions.get(symbol) {
            let prospective_size = position.size().abs() + qty.as_f64();
            let value = prospective_size * position.avg_price().as_f64().max(price.map_or(0.0, Px::as_f64));
            if value > self.limits.max_position_value {
                return Err(RiskCheckError::Reject(RiskReject::MaxPositionValueExceeded));
            }
        }

        let open_count = self.open_orders.get(&symbol).copied().unwrap_or(0);
        if open_count >= self.limits.max_open_orders_per_symbol {
            return Err(RiskCheckError::Reject(RiskReject::MaxOpenOrdersExceeded));
        }

        if self.daily_realized_loss <= -self.limits.max_daily_loss {
            return Err(RiskCheckError::Reject(RiskReject::DailyLossLimitBreached));
        }
        if self.weekly_realized_loss <= -self.limits.max_weekly_loss {
            return Err(RiskCheckError::Reject(RiskReject::WeeklyLossLimitBreached));
        }

        Ok(())
    }

    pub fn note_order_opened(&mut self, symbol: Symbol) {
        *self.open_orders.entry(symbol).or_insert(0) += 1;
    }

    pub fn note_order_closed(&mut self, symbol: Symbol) {
        if let Some(count) = self.open_orders.get_mut(&symbol) {
            *count = count.saturating_sub(1);
        }
    }

    /// Apply a fill to the position book, updating realized-loss counters
    /// and tripping the breaker immediately if the loss limit is breached.
    pub fn apply_fill(&mut self, symbol: Symbol, side: Side, qty: f64, price: f64) {
        let before = self.positions.get(symbol).map(|p| p.realized_pnl).unwrap_or(0.0);
        let position = self.positions.apply_fill(symbol, side, qty, price);
        let delta = position.realized_pnl - before;
        self.daily_realized_loss += delta;
        self.weekly_realized_loss += delta;
        if self.daily_realized_loss <= -self.limits.max_daily_loss {
            self.circuit.force_trip();
        }
    }

    pub fn on_adapter_success(&mut self) {
        self.circuit.on_success();
    }

    pub fn on_adapter_failure(&mut self) {
        self.circuit.on_failure();
    }

    pub fn trip_kill_switch(&mut self) {
        self.gate.set_kill_switch(true);
        self.circuit.force_trip();
    }

    pub fn reset_kill_switch(&mut self) {
        self.gate.set_kill_switch(false);
    }

    pub fn manual_circuit_reset(&mut self) {
        self.circuit.manual_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskLimits::default(), 5, 5, 60_000)
    }

    #[test]
    fn kill_switch_rejects_before_any_other_check() {
        let mut engine = engine();
        engine.trip_kill_switch();
        let err = engine
            .check_order(Symbol::new(1), Side::Buy, Qty::new(1.0), Some(Px::new(50.0)))
            .unwrap_err();
        assert_eq!(err, RiskCheckError::Reject(RiskReject::KillSwitchActive));
    }

    #[test]
    fn disabled_symbol_is_rejected() {
        let mut engine = engine();
        engine.gate_mut().disable(Symbol::new(1));
        let err = engine
            .check_order(Symbol::new(1), Side::Buy, Qty::new(1.0), Some(Px::new(50.0)))
            .unwrap_err();
        assert_eq!(err, RiskCheckError::Reject(RiskReject::SymbolDisabled));
    }

    #[test]
    fn oversized_notional_is_rejected() {
        let mut engine = engine();
        let huge_qty = Qty::new(1e9);
        let err = engine
            .check_order(Symbol::new(1), Side::Buy, huge_qty, Some(Px::new(50.0)))
            .unwrap_err();
        assert_eq!(err, RiskCheckError::Reject(RiskReject::MaxOrderNotionalExceeded));
    }

    #[test]
    fn circuit_breaker_seed_scenario_blocks_and_recovers() {
        let mut engine = engine();
        for _ in 0..5 {
            engine.on_adapter_failure();
        }
        let err = engine
            .check_order(Symbol::new(1), Side::Buy, Qty::new(1.0), Some(Px::new(50.0)))
            .unwrap_err();
        assert_eq!(err, RiskCheckError::CircuitOpen);

        std::thread::sleep(Duration::from_millis(15));
        engine
            .check_order(Symbol::new(1), Side::Buy, Qty::new(1.0), Some(Px::new(50.0)))
            .unwrap();
        engine.on_adapter_success();
        assert_eq!(engine.circuit().state(), crate::circuit_breaker::CircuitState::Closed);
    }
}

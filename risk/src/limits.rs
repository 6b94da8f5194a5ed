//! Configured risk limits and the typed rejection they produce (C9).

use common::constants::{DEFAULT_MAX_DAILY_LOSS, DEFAULT_MAX_ORDER_VALUE, DEFAULT_MAX_POSITION_VALUE};
use common::types::Symbol;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Global and per-symbol limits consulted by pre-trade checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum notional (price * qty) for a single order, in price units.
    pub max_order_notional: f64,
    /// Maximum absolute position value per symbol, in price units.
    pub max_position_value: f64,
    /// Maximum realized loss in a trading day before the breaker trips.
    pub max_daily_loss: f64,
    /// Maximum realized loss in a trading week before the breaker trips.
    pub max_weekly_loss: f64,
    /// Maximum number of open (non-terminal) orders per symbol.
    pub max_open_orders_per_symbol: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_notional: DEFAULT_MAX_ORDER_VALUE as f64 / common::constants::SCALE as f64,
            max_position_value: DEFAULT_MAX_POSITION_VALUE as f64 / common::constants::SCALE as f64,
            max_daily_loss: DEFAULT_MAX_DAILY_LOSS as f64 / common::constants::SCALE as f64,
            max_weekly_loss: (DEFAULT_MAX_DAILY_LOSS as f64 / common::constants::SCALE as f64) * 5.0,
            max_open_orders_per_symbol: 200,
        }
    }
}

/// Per-symbol enable flag and the process-wide kill switch.
#[derive(Debug, Default)]
pub struct SymbolGate {
    disabled: FxHashSet<Symbol>,
    kill_switch: bool,
}

impl SymbolGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&mut self, symbol: Symbol) {
        self.disabled.insert(symbol);
    }

    pub fn enable(&mut self, symbol: Symbol) {
        self.disabled.remove(&symbol);
    }

    #[must_use]
    pub fn is_enabled(&self, symbol: Symbol) -> bool {
        !self.disabled.contains(&symbol)
    }

    pub fn set_kill_switch(&mut self, active: bool) {
        self.kill_switch = active;
    }

    #[must_use]
    pub const fn kill_switch(&self) -> bool {
        self.kill_switch
    }
}

/// The first pre-trade rule that failed, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RiskReject {
    #[error("kill switch active")]
    KillSwitchActive,
    #[error("symbol disabled")]
    SymbolDisabled,
    #[error("order notional exceeds limit")]
    MaxOrderNotionalExceeded,
    #[error("position value exceeds limit")]
    MaxPositionValueExceeded,
    #[error("open order count exceeds limit")]
    MaxOpenOrdersExceeded,
    #[error("daily loss limit breached")]
    DailyLossLimitBreached,
    #[error("weekly loss limit breached")]
    WeeklyLossLimitBreached,
}

//! In-memory order store keyed by `client_order_id` (C5).
//!
//! Mutation is single-writer by contract (the owning component wraps this
//! in a mutex with short critical sections, the same "mutex-guarded map,
//! operations are short" policy used for every other shared-resource type
//! in this codebase); this type itself holds no lock.

use common::types::{Px, Qty, Side, Symbol};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Order type, narrowed to the variants this system routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Limit,
    Market,
    PostOnly,
    Ioc,
    Fok,
}

/// Lifecycle state of an order. `New` and `PendingSubmit` are pre-venue
/// states; the remaining variants also appear as execution report statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PendingSubmit,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// `true` for the four states after which no further mutation is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected | Self::Expired)
    }
}

/// A caller's request to place an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_qty: Qty,
    pub limit_price: Option<Px>,
    pub order_type: OrderType,
    pub tif: Option<String>,
}

/// An immutable execution report from the venue or simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub client_order_id: String,
    pub venue_order_id: Option<String>,
    pub status: OrderStatus,
    pub exec_qty: Qty,
    pub exec_price: Px,
    pub cum_qty: Qty,
    pub avg_price: Px,
    pub reason: Option<String>,
    pub ts_ns: u64,
}

/// The order store's view of a single order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderState {
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_qty: Qty,
    pub limit_price: Option<Px>,
    pub order_type: OrderType,
    pub tif: Option<String>,
    pub venue_order_id: Option<String>,
    pub status: OrderStatus,
    pub cum_qty: Qty,
    pub avg_price: Px,
    pub last_ts_ns: u64,
}

/// Errors raised by store operations other than a dropped execution report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OmsError {
    #[error("duplicate client order id: {0}")]
    DuplicateClientOrderId(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Why an execution report was dropped instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    InvalidTransition,
    StaleTimestamp,
    CumQtyDecrease,
}

/// Result of `apply_execution_report`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Dropped(DropReason),
}

fn is_allowed_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::{Accepted, Canceled, Expired, Filled, New, PartiallyFilled, PendingSubmit};
    if from.is_terminal() {
        return false;
    }
    match from {
        New | PendingSubmit => true,
        Accepted | PartiallyFilled => {
            matches!(to, PartiallyFilled | Filled | Canceled | Expired)
        }
        _ => false,
    }
}

/// In-memory, single-writer order store.
#[derive(Default)]
pub struct OrderStore {
    orders: FxHashMap<String, OrderState>,
}

impl OrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `New` entry for `request`. Fails with
    /// [`OmsError::DuplicateClientOrderId`] if one already exists in a
    /// non-terminal state; re-placing a terminal id replaces the old entry.
    pub fn note_order_params(&mut self, request: OrderRequest, ts_ns: u64) -> Result<(), OmsError> {
        if request.client_order_id.is_empty() || !request.client_order_id.is_ascii() {
            return Err(OmsError::InvalidInput(
                "client_order_id must be non-empty ASCII".to_string(),
            ));
        }
        if request.order_qty.is_zero() || request.order_qty.ticks() < 0 {
            return Err(OmsError::InvalidInput("order_qty must be > 0".to_string()));
        }
        if let Some(existing) = self.orders.get(&request.client_order_id) {
            if !existing.status.is_terminal() {
                return Err(OmsError::DuplicateClientOrderId(request.client_order_id));
            }
        }

        self.orders.insert(
            request.client_order_id.clone(),
            OrderState {
                client_order_id: request.client_order_id,
                symbol: request.symbol,
                side: request.side,
                order_qty: request.order_qty,
                limit_price: request.limit_price,
                order_type: request.order_type,
                tif: request.tif,
                venue_order_id: None,
                status: OrderStatus::New,
                cum_qty: Qty::ZERO,
                avg_price: Px::ZERO,
                last_ts_ns: ts_ns,
            },
        );
        Ok(())
    }

    /// Apply an execution report, following the lifecycle transition table.
    /// Illegal transitions, stale timestamps, and `cum_qty` regressions are
    /// dropped and logged, never returned as an error to the caller.
    pub fn apply_execution_report(
        &mut self,
        report: &ExecutionReport,
    ) -> Result<ApplyOutcome, OmsError> {
        let order = self
            .orders
            .get_mut(&report.client_order_id)
            .ok_or_else(|| OmsError::NotFound(report.client_order_id.clone()))?;

        if report.ts_ns < order.last_ts_ns {
            warn!(client_order_id = %report.client_order_id, "dropped stale execution report");
            return Ok(ApplyOutcome::Dropped(DropReason::StaleTimestamp));
        }
        if !is_allowed_transition(order.status, report.status) {
            warn!(
                client_order_id = %report.client_order_id,
                from = ?order.status,
                to = ?report.status,
                "dropped execution report: invalid transition"
            );
            return Ok(ApplyOutcome::Dropped(DropReason::InvalidTransition));
        }
        if report.cum_qty < order.cum_qty {
            warn!(client_order_id = %report.client_order_id, "dropped execution report: cum_qty regression");
            return Ok(ApplyOutcome::Dropped(DropReason::CumQtyDecrease));
        }

        if !report.exec_qty.is_zero() {
            let prev_cum = order.cum_qty.as_f64();
            let exec_qty = report.exec_qty.as_f64();
            let new_avg = (order.avg_price.as_f64() * prev_cum + report.exec_price.as_f64() * exec_qty)
                / (prev_cum + exec_qty);
            order.avg_price = Px::new(new_avg);
        }
        order.cum_qty = report.cum_qty;
        order.status = report.status;
        if report.venue_order_id.is_some() {
            order.venue_order_id = report.venue_order_id.clone();
        }
        order.last_ts_ns = report.ts_ns;
        Ok(ApplyOutcome::Applied)
    }

    #[must_use]
    pub fn get(&self, client_order_id: &str) -> Option<&OrderState> {
        self.orders.get(client_order_id)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&OrderState> {
        self.orders.values().collect()
    }

    #[must_use]
    pub fn list_pending(&self) -> Vec<&OrderState> {
        self.orders.values().filter(|o| !o.status.is_terminal()).collect()
    }

    #[must_use]
    pub fn list_terminal(&self) -> Vec<&OrderState> {
        self.orders.values().filter(|o| o.status.is_terminal()).collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn count_pending(&self) -> usize {
        self.orders.values().filter(|o| !o.status.is_terminal()).count()
    }

    #[must_use]
    pub fn count_terminal(&self) -> usize {
        self.orders.values().filter(|o| o.status.is_terminal()).count()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: &str) -> OrderRequest {
        OrderRequest {
            client_order_id: id.to_string(),
            symbol: Symbol::new(1),
            side: Side::Buy,
            order_qty: Qty::new(1.0),
            limit_price: Some(Px::new(50.0)),
            order_type: OrderType::Limit,
            tif: None,
        }
    }

    fn report(id: &str, status: OrderStatus, exec_qty: f64, exec_price: f64, cum_qty: f64, ts_ns: u64) -> ExecutionReport {
        ExecutionReport {
            client_order_id: id.to_string(),
            venue_order_id: Some("v1".to_string()),
            status,
            exec_qty: Qty::new(exec_qty),
            exec_price: Px::new(exec_price),
            cum_qty: Qty::new(cum_qty),
            avg_price: Px::new(exec_price),
            reason: None,
            ts_ns,
        }
    }

    #[test]
    fn duplicate_non_terminal_is_rejected() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 1).unwrap();
        let err = store.note_order_params(req("A"), 2).unwrap_err();
        assert!(matches!(err, OmsError::DuplicateClientOrderId(_)));
    }

    #[test]
    fn wal_replay_seed_scenario_vwap() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 1).unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::Accepted, 0.0, 0.0, 0.0, 2))
            .unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::PartiallyFilled, 0.4, 50.0, 0.4, 3))
            .unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::Filled, 0.6, 51.0, 1.0, 4))
            .unwrap();

        let order = store.get("A").unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.cum_qty, Qty::new(1.0));
        assert!((order.avg_price.as_f64() - 50.6).abs() < 1e-9);
    }

    #[test]
    fn illegal_transition_from_terminal_is_dropped() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 1).unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::Filled, 1.0, 50.0, 1.0, 2))
            .unwrap();
        let outcome = store
            .apply_execution_report(&report("A", OrderStatus::Canceled, 0.0, 0.0, 1.0, 3))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Dropped(DropReason::InvalidTransition));
    }

    #[test]
    fn cum_qty_regression_is_dropped() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 1).unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::PartiallyFilled, 0.5, 50.0, 0.5, 2))
            .unwrap();
        let outcome = store
            .apply_execution_report(&report("A", OrderStatus::PartiallyFilled, 0.0, 0.0, 0.2, 3))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Dropped(DropReason::CumQtyDecrease));
    }

    #[test]
    fn stale_timestamp_is_dropped() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 5).unwrap();
        store
            .apply_execution_report(&report("A", OrderStatus::Accepted, 0.0, 0.0, 0.0, 10))
            .unwrap();
        let outcome = store
            .apply_execution_report(&report("A", OrderStatus::PartiallyFilled, 0.1, 50.0, 0.1, 3))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Dropped(DropReason::StaleTimestamp));
    }

    #[test]
    fn idempotent_place_leaves_a_single_entry() {
        let mut store = OrderStore::new();
        store.note_order_params(req("A"), 1).unwrap();
        assert_eq!(store.note_order_params(req("A"), 2).unwrap_err(), OmsError::DuplicateClientOrderId("A".to_string()));
        assert_eq!(store.count(), 1);
    }
}

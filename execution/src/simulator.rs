//! A deterministic, in-process execution adapter used for local
//! development and tests. Accepts every valid order immediately.

use crate::adapter::{Ack, ExecutionAdapter, SubscriptionHandle};
use crate::idempotency::IdempotencyMap;
use common::constants::IDEMPOTENCY_TTL_MS;
use common::errors::RejectKind;
use common::types::{Px, Qty, Ts};
use std::time::Duration;
use veloz_oms::{ExecutionReport, OrderRequest, OrderStatus};

/// Always-accept simulator adapter.
pub struct Simulator {
    idempotency: IdempotencyMap,
    next_venue_seq: u64,
    subscribers: Vec<Box<dyn FnMut(ExecutionReport) + Send>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            idempotency: IdempotencyMap::new(Duration::from_millis(IDEMPOTENCY_TTL_MS)),
            next_venue_seq: 0,
            subscribers: Vec::new(),
        }
    }

    fn next_venue_order_id(&mut self) -> String {
        let id = self.next_venue_seq;
        self.next_venue_seq += 1;
        format!("SIM-{id}")
    }

    fn notify(&mut self, report: ExecutionReport) {
        for callback in &mut self.subscribers {
            callback(report.clone());
        }
    }
}

impl ExecutionAdapter for Simulator {
    fn place(&mut self, request: &OrderRequest) -> Result<Ack, RejectKind> {
        if let Some(existing) = self.idempotency.get(&request.client_order_id) {
            return Ok(existing);
        }
        if request.order_qty.is_zero() {
            return Err(RejectKind::InvalidQty);
        }
        if let Some(limit_price) = request.limit_price {
            if limit_price.ticks() <= 0 {
                return Err(RejectKind::InvalidPrice);
            }
        }

        let venue_order_id = self.next_venue_order_id();
        let ack = Ack {
            client_order_id: request.client_order_id.clone(),
            venue_order_id: venue_order_id.clone(),
        };
        self.idempotency.insert(request.client_order_id.clone(), ack.clone());
        self.notify(ExecutionReport {
            client_order_id: ack.client_order_id.clone(),
            venue_order_id: Some(venue_order_id),
            status: OrderStatus::Accepted,
            exec_qty: Qty::ZERO,
            exec_price: Px::ZERO,
            cum_qty: Qty::ZERO,
            avg_price: Px::ZERO,
            reason: None,
            ts_ns: Ts::now().as_nanos(),
        });
        Ok(ack)
    }

    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, RejectKind> {
        let ack = self
            .idempotency
            .get(client_order_id)
            .ok_or_else(|| RejectKind::Other(404, "unknown client order id".to_string()))?;
        self.notify(ExecutionReport {
            client_order_id: ack.client_order_id.clone(),
            venue_order_id: Some(ack.venue_order_id.clone()),
            status: OrderStatus::Canceled,
            exec_qty: Qty::ZERO,
            exec_price: Px::ZERO,
            cum_qty: Qty::ZERO,
            avg_price: Px::ZERO,
            reason: Some("canceled by request".to_string()),
            ts_ns: Ts::now().as_nanos(),
        });
        Ok(ack)
    }

    fn subscribe_reports(
        &mut self,
        callback: Box<dyn FnMut(ExecutionReport) + Send>,
    ) -> SubscriptionHandle {
        self.subscribers.push(callback);
        SubscriptionHandle((self.subscribers.len() - 1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Px, Qty, Side, Symbol};
    use veloz_oms::OrderType;

    fn request(id: &str) -> OrderRequest {
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

    #[test]
    fn idempotent_place_seed_scenario() {
        let mut sim = Simulator::new();
        let ack1 = sim.place(&request("A")).unwrap();
        let ack2 = sim.place(&request("A")).unwrap();
        assert_eq!(ack1, ack2);
    }

    #[test]
    fn cancel_of_unknown_order_is_rejected() {
        let mut sim = Simulator::new();
        let err = sim.cancel("nope").unwrap_err();
        assert!(matches!(err, RejectKind::Other(404, _)));
    }
}

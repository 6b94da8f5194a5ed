//! Retry wrapper applying the documented backoff policy to the retryable
//! `RejectKind` variants (`RateLimited`, `VenueDown`).

use crate::adapter::{Ack, ExecutionAdapter};
use crate::backoff::Backoff;
use common::errors::RejectKind;
use veloz_oms::OrderRequest;

/// Call `adapter.place`, retrying retryable rejects with exponential
/// backoff up to `max_attempts` additional tries. Terminal rejects
/// propagate immediately.
pub fn place_with_retry(
    adapter: &mut dyn ExecutionAdapter,
    request: &OrderRequest,
    max_attempts: u32,
) -> Result<Ack, RejectKind> {
    let mut backoff = Backoff::new();
    let mut rng = rand::thread_rng();
    loop {
        match adapter.place(request) {
            Ok(ack) => return Ok(ack),
            Err(reject) => {
                if reject.is_retryable() && backoff.attempt() < max_attempts {
                    let delay = backoff.next_delay(&mut rng);
                    std::thread::sleep(delay);
                } else {
                    return Err(reject);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Simulator;
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
    fn succeeds_immediately_without_retrying() {
        let mut sim = Simulator::new();
        let ack = place_with_retry(&mut sim, &request("A"), 3).unwrap();
        assert_eq!(ack.client_order_id, "A");
    }

    #[test]
    fn terminal_reject_propagates_without_retry() {
        let mut sim = Simulator::new();
        let mut bad = request("A");
        bad.order_qty = Qty::ZERO;
        let err = place_with_retry(&mut sim, &bad, 3).unwrap_err();
        assert_eq!(err, RejectKind::InvalidQty);
    }
}

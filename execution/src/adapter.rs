//! The venue-agnostic execution adapter contract (C7).

use common::errors::RejectKind;
use veloz_oms::{ExecutionReport, OrderRequest};

/// Acknowledgement of a successful `place` or `cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub client_order_id: String,
    pub venue_order_id: String,
}

/// Opaque handle returned by `subscribe_reports`. Carries no behavior of
/// its own; adapters that support unsubscribing expose that separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(pub u64);

/// Capability set a venue integration implements: place, cancel, and a
/// push feed of execution reports. Kept as a plain trait object rather
/// than anything more elaborate, per the "small stable vtable" guidance
/// for dynamic dispatch in this codebase.
pub trait ExecutionAdapter: Send {
    fn place(&mut self, request: &OrderRequest) -> Result<Ack, RejectKind>;
    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, RejectKind>;
    fn subscribe_reports(
        &mut self,
        callback: Box<dyn FnMut(ExecutionReport) + Send>,
    ) -> SubscriptionHandle;
}

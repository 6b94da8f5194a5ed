//! Shared application state handed to every handler.

use crate::bridge_client::EngineBridge;
use crate::rate_limiter::{RateLimiter, RouteLimit};
use common::config::CoreConfig;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use veloz_broadcaster::Broadcaster;

/// Last known top-of-book for one symbol, cached from `market` events.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MarketSnapshot {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
}

/// Last known status for one order, cached from `order_*` events.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderSnapshot {
    pub client_order_id: String,
    pub venue_order_id: Option<String>,
    pub status: String,
    pub cum_qty: f64,
    pub timestamp: String,
}

/// Last known account balances, cached from `account` events. The wire
/// schema beyond `balance` is an open question (spec §9); only the field
/// the engine actually emits today is modeled.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AccountSnapshot {
    pub balance: f64,
}

/// Caches rebuilt from the engine bridge's outbound stream, read by HTTP
/// handlers without round-tripping to the engine on every request.
#[derive(Default)]
pub struct Caches {
    pub market: Mutex<FxHashMap<String, MarketSnapshot>>,
    pub orders: Mutex<FxHashMap<String, OrderSnapshot>>,
    pub account: Mutex<AccountSnapshot>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub bridge: Arc<EngineBridge>,
    pub broadcaster: Arc<Broadcaster>,
    pub rate_limiter: Arc<RateLimiter>,
    pub caches: Arc<Caches>,
    pub audit: Arc<dyn crate::audit::AuditSink>,
    pub authenticator: Arc<dyn crate::auth::Authenticator>,
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: CoreConfig,
        bridge: Arc<EngineBridge>,
        broadcaster: Arc<Broadcaster>,
        caches: Arc<Caches>,
        audit: Arc<dyn crate::audit::AuditSink>,
        authenticator: Arc<dyn crate::auth::Authenticator>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.capacity, config.rate_limit.refill_per_sec)
            .with_route_override("/api/order", RouteLimit { capacity: config.rate_limit.capacity, refill_per_sec: config.rate_limit.refill_per_sec })
            .with_route_override("/api/cancel", RouteLimit { capacity: config.rate_limit.capacity, refill_per_sec: config.rate_limit.refill_per_sec });
        Self {
            config: Arc::new(config),
            bridge,
            broadcaster,
            rate_limiter: Arc::new(rate_limiter),
            caches,
            audit,
            authenticator,
            start_time: Instant::now(),
        }
    }
}

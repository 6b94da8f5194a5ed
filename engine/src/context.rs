//! Wires C1–C9 and C14 together into the single-process data plane.

use common::types::{Px, Qty, Side, Symbol, Ts};
use rustc_hash::FxHashMap;
use veloz_bridge::{Command, Event, OutboundBuffer, StrategyManager};
use veloz_execution::{place_with_retry, ExecutionAdapter, Simulator};
use veloz_oms::{ExecutionReport, OrderRequest, OrderStatus, OrderStore, OrderType, WalError, WalWriter};
use veloz_orderbook::OrderBook;
use veloz_risk::{RiskCheckError, RiskEngine, RiskLimits};

/// Counts of commands the engine could not act on, surfaced on `/api/health`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub commands_processed: u64,
    pub parse_errors: u64,
}

/// Owns every in-process component and the single dispatch path from a
/// parsed [`Command`] to the outbound [`Event`]s it produces.
pub struct DataPlane {
    books: FxHashMap<Symbol, OrderBook>,
    store: OrderStore,
    wal: WalWriter,
    risk: RiskEngine,
    strategies: StrategyManager,
    adapter: Box<dyn ExecutionAdapter>,
    pub outbound: OutboundBuffer,
    stats: EngineStats,
}

impl DataPlane {
    #[must_use]
    pub fn new(wal: WalWriter, outbound_capacity: usize) -> Self {
        Self {
            books: FxHashMap::default(),
            store: OrderStore::new(),
            wal,
            risk: RiskEngine::new(
                RiskLimits::default(),
                common::constants::CIRCUIT_TRIP_THRESHOLD,
                common::constants::CIRCUIT_INITIAL_COOLDOWN_MS,
                common::constants::CIRCUIT_MAX_COOLDOWN_MS,
            ),
            strategies: StrategyManager::new(),
            adapter: Box::new(Simulator::new()),
            outbound: OutboundBuffer::new(outbound_capacity),
            stats: EngineStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn note_parse_error(&mut self) {
        self.stats.parse_errors += 1;
    }

    #[must_use]
    pub fn book(&self, symbol: Symbol) -> Option<&OrderBook> {
        self.books.get(&symbol)
    }

    #[must_use]
    pub fn order_store(&self) -> &OrderStore {
        &self.store
    }

    #[must_use]
    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    #[must_use]
    pub fn strategies_mut(&mut self) -> &mut StrategyManager {
        &mut self.strategies
    }

    /// Apply a delta to a symbol's book, creating it on first use.
    pub fn apply_market_delta(&mut self, symbol: Symbol, side: Side, price: Px, qty: Qty, sequence: u64, ts: Ts) {
        let book = self.books.entry(symbol).or_insert_with(|| OrderBook::new(symbol));
        let _ = book.apply_delta(side, price, qty, sequence, ts);
        let top = book.top_of_book();
        if top.best_bid.is_some() || top.best_ask.is_some() {
            let market = Event::Market {
                symbol: symbol.to_string(),
                best_bid: top.best_bid.map(Px::as_f64),
                best_ask: top.best_ask.map(Px::as_f64),
                timestamp: ts.to_iso8601_millis(),
            };
            self.strategies.dispatch_market(symbol, &market);
            self.outbound.push(market);
        }
    }

    /// Run one command through its full path: risk check, venue place/cancel
    /// with retry, WAL logging, and order-store update. Returns the events
    /// produced, in the order they should be emitted.
    pub fn handle_command(&mut self, cmd: Command) -> Vec<Event> {
        self.stats.commands_processed += 1;
        let now = Ts::now();
        match cmd {
            Command::Ping => Vec::new(),
            Command::Cancel { client_order_id } => self.handle_cancel(&client_order_id, now),
            Command::PlaceLimit { side, symbol, qty, price, client_order_id } => {
                self.handle_place(symbol, side, qty, Some(price), OrderType::Limit, client_order_id, now)
            }
            Command::PlaceMarket { side, symbol, qty, client_order_id } => {
                self.handle_place(symbol, side, qty, None, OrderType::Market, client_order_id, now)
            }
        }
    }

    fn handle_place(
        &mut self,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        price: Option<Px>,
        order_type: OrderType,
        client_order_id: String,
        now: Ts,
    ) -> Vec<Event> {
        if let Err(err) = self.risk.check_order(symbol, side, qty, price) {
            let reason = match err {
                RiskCheckError::CircuitOpen => "circuit_open".to_string(),
                RiskCheckError::Reject(reject) => reject.to_string(),
            };
            return vec![Event::OrderRejected { client_order_id, reason, timestamp: now.to_iso8601_millis() }];
        }

        let request = OrderRequest { client_order_id: client_order_id.clone(), symbol, side, order_qty: qty, limit_price: price, order_type, tif: None };
        if self.store.note_order_params(request.clone(), now.as_nanos()).is_err() {
            return Vec::new();
        }
        if let Some(event) = self.log_to_wal(WalWriter::log_order_new, &request, now) {
            return vec![event];
        }
        self.risk.note_order_opened(symbol);

        match place_with_retry(self.adapter.as_mut(), &request, 3) {
            Ok(ack) => {
                self.risk.on_adapter_success();
                let report = ExecutionReport {
                    client_order_id: client_order_id.clone(),
                    venue_order_id: Some(ack.venue_order_id.clone()),
                    status: OrderStatus::Accepted,
                    exec_qty: Qty::ZERO,
                    exec_price: Px::ZERO,
                    cum_qty: Qty::ZERO,
                    avg_price: Px::ZERO,
                    reason: None,
                    ts_ns: now.as_nanos(),
                };
                let _ = self.store.apply_execution_report(&report);
                if let Some(event) = self.log_to_wal(WalWriter::log_order_update, &report, now) {
                    return vec![event];
                }
                vec![Event::OrderAccepted { client_order_id, venue_order_id: ack.venue_order_id, timestamp: now.to_iso8601_millis() }]
            }
            Err(reject) => {
                self.risk.on_adapter_failure();
                self.risk.note_order_closed(symbol);
                let cancel_note = format!("{client_order_id}:{reject}");
                if let Some(event) = self.log_to_wal(WalWriter::log_order_cancel, &cancel_note, now) {
                    return vec![event];
                }
                vec![Event::OrderRejected { client_order_id, reason: reject.to_string(), timestamp: now.to_iso8601_millis() }]
            }
        }
    }

    fn handle_cancel(&mut self, client_order_id: &str, now: Ts) -> Vec<Event> {
        match self.adapter.cancel(client_order_id) {
            Ok(ack) => {
                let report = ExecutionReport {
                    client_order_id: ack.client_order_id.clone(),
                    venue_order_id: Some(ack.venue_order_id),
                    status: OrderStatus::Canceled,
                    exec_qty: Qty::ZERO,
                    exec_price: Px::ZERO,
                    cum_qty: self.store.get(client_order_id).map(|o| o.cum_qty).unwrap_or(Qty::ZERO),
                    avg_price: self.store.get(client_order_id).map(|o| o.avg_price).unwrap_or(Px::ZERO),
                    reason: None,
                    ts_ns: now.as_nanos(),
                };
                let _ = self.store.apply_execution_report(&report);
                if let Some(event) = self.log_to_wal(WalWriter::log_order_cancel, &report, now) {
                    return vec![event];
                }
                vec![Event::OrderUpdate {
                    client_order_id: ack.client_order_id,
                    status: "canceled".to_string(),
                    cum_qty: report.cum_qty.as_f64(),
                    timestamp: now.to_iso8601_millis(),
                }]
            }
            Err(_) => vec![Event::Error { message: format!("unknown client order id: {client_order_id}"), timestamp: now.to_iso8601_millis() }],
        }
    }

    /// Serialize `payload` and append it through `log`, tripping the kill
    /// switch and returning an error event if the write fails. The WAL is
    /// the single source of truth for recovery; a failed write must halt
    /// new order flow rather than proceed with an ungrounded store.
    fn log_to_wal<T, F>(&mut self, log: F, payload: &T, now: Ts) -> Option<Event>
    where
        T: serde::Serialize,
        F: FnOnce(&mut WalWriter, &[u8], u64) -> Result<u64, WalError>,
    {
        let bytes = bincode::serialize(payload).expect("wal payload always serializes");
        match log(&mut self.wal, &bytes, now.as_nanos()) {
            Ok(_) => None,
            Err(err) => {
                tracing::error!(error = %err, "wal write failed, halting new order flow");
                self.risk.trip_kill_switch();
                Some(Event::Error { message: format!("wal unavailable: {err}"), timestamp: now.to_iso8601_millis() })
            }
        }
    }
}

//! Engine bridge client: the gateway side of C11's stdio NDJSON protocol.
//!
//! Spawns the engine binary as a child process, writes command lines to
//! its stdin, and runs a background thread that parses each outbound
//! event line, folds it into the read-side caches, and rebroadcasts it to
//! SSE subscribers. Mirrors the teacher's gRPC client-per-service pattern
//! (`services/gateway/src/grpc_clients` connects out to each backend) but
//! over a process pipe instead of a network socket, per spec §2's "NDJSON
//! over pipes" engine bridge.

use crate::state::{AccountSnapshot, Caches, MarketSnapshot, OrderSnapshot};
use common::types::{Px, Qty, Side, Symbol};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command as ProcessCommand, Stdio};
use std::sync::Arc;
use veloz_bridge::Event;
use veloz_broadcaster::Broadcaster;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine stdin/stdout not piped")]
    NotPiped,
    #[error("failed to write to engine stdin: {0}")]
    Write(#[source] std::io::Error),
}

/// Owns the engine child process and the single writer handle to its
/// stdin. Reading is delegated to a background thread that updates shared
/// caches directly; callers of `send_*` do not wait for a reply.
pub struct EngineBridge {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
}

impl EngineBridge {
    /// Spawn `bin` and start the reader thread. `caches` and `broadcaster`
    /// are updated as events arrive on the engine's stdout.
    pub fn spawn(bin: &str, caches: Arc<Caches>, broadcaster: Arc<Broadcaster>) -> Result<Self, BridgeError> {
        let mut child = ProcessCommand::new(bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(BridgeError::Spawn)?;

        let stdin = child.stdin.take().ok_or(BridgeError::NotPiped)?;
        let stdout = child.stdout.take().ok_or(BridgeError::NotPiped)?;

        std::thread::spawn(move || read_loop(stdout, &caches, &broadcaster));

        Ok(Self { child: Mutex::new(child), stdin: Mutex::new(stdin) })
    }

    pub fn send_line(&self, line: &str) -> Result<(), BridgeError> {
        let mut stdin = self.stdin.lock();
        writeln!(stdin, "{line}").map_err(BridgeError::Write)?;
        stdin.flush().map_err(BridgeError::Write)
    }

    pub fn send_place_limit(&self, side: Side, symbol: Symbol, qty: Qty, price: Px, client_order_id: &str) -> Result<(), BridgeError> {
        let side_token = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        self.send_line(&format!("ORDER {side_token} {symbol} {} {} {client_order_id}", qty.as_f64(), price.as_f64()))
    }

    pub fn send_place_market(&self, side: Side, symbol: Symbol, qty: Qty, client_order_id: &str) -> Result<(), BridgeError> {
        let side_token = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        self.send_line(&format!("ORDER {side_token} {symbol} {} MARKET {client_order_id}", qty.as_f64()))
    }

    pub fn send_cancel(&self, client_order_id: &str) -> Result<(), BridgeError> {
        self.send_line(&format!("CANCEL {client_order_id}"))
    }

    /// `true` if the engine child process is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.child.lock().try_wait().ok().flatten().is_none()
    }
}

fn read_loop(stdout: impl std::io::Read, caches: &Arc<Caches>, broadcaster: &Arc<Broadcaster>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "engine stdout read error, stopping bridge reader");
                break;
            }
        };
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, line = %line, "failed to parse engine event line");
                continue;
            }
        };
        apply_event_to_caches(caches, &event);
        if let Ok(payload) = serde_json::to_value(&event) {
            broadcaster.broadcast(payload);
        }
    }
    tracing::warn!("engine bridge reader thread exiting: engine stdout closed");
}

fn apply_event_to_caches(caches: &Caches, event: &Event) {
    match event {
        Event::Market { symbol, best_bid, best_ask, .. } => {
            caches.market.lock().insert(symbol.clone(), MarketSnapshot { best_bid: *best_bid, best_ask: *best_ask });
        }
        Event::OrderAccepted { client_order_id, venue_order_id, timestamp } => {
            caches.orders.lock().insert(
                client_order_id.clone(),
                OrderSnapshot {
                    client_order_id: client_order_id.clone(),
                    venue_order_id: Some(venue_order_id.clone()),
                    status: "accepted".to_string(),
                    cum_qty: 0.0,
                    timestamp: timestamp.clone(),
                },
            );
        }
        Event::OrderRejected { client_order_id, timestamp, .. } => {
            caches.orders.lock().insert(
                client_order_id.clone(),
                OrderSnapshot {
                    client_order_id: client_order_id.clone(),
                    venue_order_id: None,
                    status: "rejected".to_string(),
                    cum_qty: 0.0,
                    timestamp: timestamp.clone(),
                },
            );
        }
        Event::OrderUpdate { client_order_id, status, cum_qty, timestamp } => {
            let mut orders = caches.orders.lock();
            let venue_order_id = orders.get(client_order_id).and_then(|o| o.venue_order_id.clone());
            orders.insert(
                client_order_id.clone(),
                OrderSnapshot {
                    client_order_id: client_order_id.clone(),
                    venue_order_id,
                    status: status.clone(),
                    cum_qty: *cum_qty,
                    timestamp: timestamp.clone(),
                },
            );
        }
        Event::OrderState { client_order_id, status, timestamp } => {
            let mut orders = caches.orders.lock();
            let (venue_order_id, cum_qty) = orders
                .get(client_order_id)
                .map_or((None, 0.0), |o| (o.venue_order_id.clone(), o.cum_qty));
            orders.insert(
                client_order_id.clone(),
                OrderSnapshot { client_order_id: client_order_id.clone(), venue_order_id, status: status.clone(), cum_qty, timestamp: timestamp.clone() },
            );
        }
        Event::Fill { client_order_id, qty, timestamp, .. } => {
            let mut orders = caches.orders.lock();
            if let Some(existing) = orders.get_mut(client_order_id) {
                existing.cum_qty += qty;
                existing.timestamp = timestamp.clone();
            }
        }
        Event::Account { balance, .. } => {
            *caches.account.lock() = AccountSnapshot { balance: *balance };
        }
        Event::Error { .. } => {}
    }
}

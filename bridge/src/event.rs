//! Outbound event envelope, engine → gateway (C11).

use serde::{Deserialize, Serialize};

/// One NDJSON outbound line. Internally tagged on `type`, snake_case per
/// variant name, matching the wire vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    OrderAccepted {
        client_order_id: String,
        venue_order_id: String,
        timestamp: String,
    },
    OrderRejected {
        client_order_id: String,
        reason: String,
        timestamp: String,
    },
    OrderUpdate {
        client_order_id: String,
        status: String,
        cum_qty: f64,
        timestamp: String,
    },
    Fill {
        client_order_id: String,
        symbol: String,
        qty: f64,
        price: f64,
        timestamp: String,
    },
    Market {
        symbol: String,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
        timestamp: String,
    },
    Account {
        balance: f64,
        timestamp: String,
    },
    OrderState {
        client_order_id: String,
        status: String,
        timestamp: String,
    },
    Error {
        message: String,
        timestamp: String,
    },
}

/// Priority class used by the output backpressure policy: `Market` is
/// dropped first, everything else is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Droppable,
    Essential,
}

impl Event {
    #[must_use]
    pub const fn class(&self) -> EventClass {
        match self {
            Self::Market { .. } => EventClass::Droppable,
            _ => EventClass::Essential,
        }
    }

    /// Serialize to one NDJSON line (no trailing newline).
    ///
    /// # Panics
    /// Panics only if `Event`'s own type fails to serialize, which cannot
    /// happen for this closed, derive-generated shape.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("Event serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_events_are_droppable() {
        let event = Event::Market {
            symbol: "SYM_1".to_string(),
            best_bid: Some(50.0),
            best_ask: Some(50.1),
            timestamp: "2025-01-15T10:30:00.123Z".to_string(),
        };
        assert_eq!(event.class(), EventClass::Droppable);
        assert!(event.to_line().starts_with(r#"{"type":"market""#));
    }

    #[test]
    fn fill_events_are_essential() {
        let event = Event::Fill {
            client_order_id: "o1".to_string(),
            symbol: "SYM_1".to_string(),
            qty: 0.1,
            price: 42000.0,
            timestamp: "2025-01-15T10:30:00.123Z".to_string(),
        };
        assert_eq!(event.class(), EventClass::Essential);
        assert!(event.to_line().starts_with(r#"{"type":"fill""#));
    }
}

//! Strategy manager lifecycle and signal routing (C14). Contract only:
//! strategy bodies are external code implementing [`Strategy`].

use crate::event::Event;
use common::types::Symbol;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Lifecycle state of one registered strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Loaded,
    Running,
    Stopped,
    Unloaded,
}

/// Callbacks a strategy implements. Must not block: long work is the
/// strategy's own responsibility to hand off elsewhere.
pub trait Strategy: Send {
    fn on_market(&mut self, symbol: Symbol, event: &Event);
    fn on_fill(&mut self, event: &Event);
    fn on_order_update(&mut self, event: &Event);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("unknown strategy id: {0}")]
    NotFound(String),
    #[error("strategy id already loaded: {0}")]
    AlreadyLoaded(String),
    #[error("invalid lifecycle transition from {from:?}")]
    InvalidTransition { from: StrategyState },
}

struct StrategyEntry {
    state: StrategyState,
    symbols: FxHashSet<Symbol>,
    strategy: Box<dyn Strategy>,
}

/// Routes market/fill/order-update events to the strategies subscribed to
/// their symbol, and enforces the `load -> start -> ... -> stop -> unload`
/// lifecycle.
#[derive(Default)]
pub struct StrategyManager {
    strategies: FxHashMap<String, StrategyEntry>,
}

impl StrategyManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        id: &str,
        symbols: impl IntoIterator<Item = Symbol>,
        strategy: Box<dyn Strategy>,
    ) -> Result<(), StrategyError> {
        if self.strategies.contains_key(id) {
            return Err(StrategyError::AlreadyLoaded(id.to_string()));
        }
        self.strategies.insert(
            id.to_string(),
            StrategyEntry {
                state: StrategyState::Loaded,
                symbols: symbols.into_iter().collect(),
                strategy,
            },
        );
        Ok(())
    }

    pub fn start(&mut self, id: &str) -> Result<(), StrategyError> {
        self.transition(id, StrategyState::Loaded, StrategyState::Running)
    }

    pub fn stop(&mut self, id: &str) -> Result<(), StrategyError> {
        self.transition(id, StrategyState::Running, StrategyState::Stopped)
    }

    pub fn unload(&mut self, id: &str) -> Result<(), StrategyError> {
        let entry = self.strategies.get(id).ok_or_else(|| StrategyError::NotFound(id.to_string()))?;
        if entry.state != StrategyState::Stopped {
            return Err(StrategyError::InvalidTransition { from: entry.state });
        }
        self.strategies.remove(id);
        Ok(())
    }

    fn transition(&mut self, id: &str, from: StrategyState, to: StrategyState) -> Result<(), StrategyError> {
        let entry = self.strategies.get_mut(id).ok_or_else(|| StrategyError::NotFound(id.to_string()))?;
        if entry.state != from {
            return Err(StrategyError::InvalidTransition { from: entry.state });
        }
        entry.state = to;
        Ok(())
    }

    #[must_use]
    pub fn state_of(&self, id: &str) -> Option<StrategyState> {
        self.strategies.get(id).map(|e| e.state)
    }

    /// Dispatch a market-data event for `symbol` to every running strategy
    /// subscribed to it.
    pub fn dispatch_market(&mut self, symbol: Symbol, event: &Event) {
        for entry in self.strategies.values_mut() {
            if entry.state == StrategyState::Running && entry.symbols.contains(&symbol) {
                entry.strategy.on_market(symbol, event);
            }
        }
    }

    pub fn dispatch_fill(&mut self, symbol: Symbol, event: &Event) {
        for entry in self.strategies.values_mut() {
            if entry.state == StrategyState::Running && entry.symbols.contains(&symbol) {
                entry.strategy.on_fill(event);
            }
        }
    }

    pub fn dispatch_order_update(&mut self, symbol: Symbol, event: &Event) {
        for entry in self.strategies.values_mut() {
            if entry.state == StrategyState::Running && entry.symbols.contains(&symbol) {
                entry.strategy.on_order_update(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStrategy {
        market_calls: Arc<AtomicUsize>,
    }

    impl Strategy for CountingStrategy {
        fn on_market(&mut self, _symbol: Symbol, _event: &Event) {
            self.market_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn on_fill(&mut self, _event: &Event) {}
        fn on_order_update(&mut self, _event: &Event) {}
    }

    fn market_event() -> Event {
        Event::Market {
            symbol: "SYM_1".to_string(),
            best_bid: Some(50.0),
            best_ask: Some(50.1),
            timestamp: "t".to_string(),
        }
    }

    #[test]
    fn lifecycle_must_be_followed_in_order() {
        let mut manager = StrategyManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        manager
            .load("s1", [Symbol::new(1)], Box::new(CountingStrategy { market_calls: calls.clone() }))
            .unwrap();

        assert_eq!(manager.stop("s1").unwrap_err(), StrategyError::InvalidTransition { from: StrategyState::Loaded });
        manager.start("s1").unwrap();
        assert_eq!(manager.start("s1").unwrap_err(), StrategyError::InvalidTransition { from: StrategyState::Running });
        manager.stop("s1").unwrap();
        manager.unload("s1").unwrap();
        assert_eq!(manager.state_of("s1"), None);
    }

    #[test]
    fn only_running_subscribed_strategies_receive_events() {
        let mut manager = StrategyManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        manager
            .load("s1", [Symbol::new(1)], Box::new(CountingStrategy { market_calls: calls.clone() }))
            .unwrap();

        manager.dispatch_market(Symbol::new(1), &market_event());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "not yet running");

        manager.start("s1").unwrap();
        manager.dispatch_market(Symbol::new(2), &market_event());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "different symbol");

        manager.dispatch_market(Symbol::new(1), &market_event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

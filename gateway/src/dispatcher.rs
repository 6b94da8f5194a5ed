//! HTTP request dispatcher: method/path routing with segment-exact
//! matching, 404/405/OPTIONS handling (C12).
//!
//! New code: the teacher's `server.rs` builds an axum `Router` and lets
//! axum's own method dispatch decide 404 vs 405. That collapses the
//! distinction this component is specified to keep explicit — method-miss
//! must answer 405 with an `Allow` header, not 404 — so routes are matched
//! against a small table by hand and axum is used only for the server loop
//! and a single `fallback` entry point.

use axum::http::Method;
use std::collections::BTreeSet;

/// One path segment in a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

fn split_pattern(pattern: &'static str) -> Vec<Segment> {
    pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Segment::Param(name)
            } else {
                Segment::Literal(s)
            }
        })
        .collect()
}

fn matches_path(segments: &[Segment], path: &str) -> Option<Vec<(&'static str, String)>> {
    let parts: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() != segments.len() {
        return None;
    }
    let mut params = Vec::new();
    for (segment, part) in segments.iter().zip(parts.iter()) {
        match segment {
            Segment::Literal(lit) => {
                if lit != part {
                    return None;
                }
            }
            Segment::Param(name) => params.push((*name, (*part).to_string())),
        }
    }
    Some(params)
}

/// A registered `(method, pattern) -> route name` entry.
struct RouteEntry {
    method: Method,
    segments: Vec<Segment>,
    route: RouteName,
}

/// The stable, closed set of handler identities the dispatcher can match
/// to. Handlers themselves live in `handlers.rs`; this keeps the route
/// table a plain data structure with no function-pointer plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Health,
    ApiHealth,
    Market,
    Orders,
    Order,
    Cancel,
    OrderState,
    Stream,
    Account,
    ConfigGet,
    ConfigPost,
    Metrics,
}

/// Outcome of matching a request against the route table. Allowed methods
/// are kept as their string names (`Method` has no total order) so the
/// `Allow` header can be built with a stable sort.
pub enum Dispatch {
    Matched { route: RouteName, params: Vec<(&'static str, String)> },
    Options { allowed: BTreeSet<String> },
    MethodNotAllowed { allowed: BTreeSet<String> },
    NotFound,
}

pub struct Dispatcher {
    routes: Vec<RouteEntry>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Build the route table from spec §6's reference set.
    #[must_use]
    pub fn new() -> Self {
        use Method as M;
        let table: &[(Method, &'static str, RouteName)] = &[
            (M::GET, "/health", RouteName::Health),
            (M::GET, "/api/health", RouteName::ApiHealth),
            (M::GET, "/api/market", RouteName::Market),
            (M::GET, "/api/orders", RouteName::Orders),
            (M::POST, "/api/order", RouteName::Order),
            (M::POST, "/api/cancel", RouteName::Cancel),
            (M::GET, "/api/order_state", RouteName::OrderState),
            (M::GET, "/api/stream", RouteName::Stream),
            (M::GET, "/api/account", RouteName::Account),
            (M::GET, "/api/config", RouteName::ConfigGet),
            (M::POST, "/api/config", RouteName::ConfigPost),
            (M::GET, "/metrics", RouteName::Metrics),
        ];
        let routes = table
            .iter()
            .cloned()
            .map(|(method, pattern, route)| RouteEntry { method, segments: split_pattern(pattern), route })
            .collect();
        Self { routes }
    }

    /// Lookup order: exact method on exact path; on miss, any method on
    /// exact path (for 405/OPTIONS); on miss, 404.
    #[must_use]
    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch {
        let mut allowed = BTreeSet::new();
        let mut exact: Option<(RouteName, Vec<(&'static str, String)>)> = None;

        for entry in &self.routes {
            if let Some(params) = matches_path(&entry.segments, path) {
                allowed.insert(entry.method.to_string());
                if entry.method == *method && exact.is_none() {
                    exact = Some((entry.route, params));
                }
            }
        }

        if allowed.is_empty() {
            return Dispatch::NotFound;
        }
        if *method == Method::OPTIONS {
            return Dispatch::Options { allowed };
        }
        match exact {
            Some((route, params)) => Dispatch::Matched { route, params },
            None => Dispatch::MethodNotAllowed { allowed },
        }
    }
}

#[must_use]
pub fn allow_header_value(methods: &BTreeSet<String>) -> String {
    let mut values: BTreeSet<String> = methods.clone();
    values.insert("OPTIONS".to_string());
    values.into_iter().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_method_and_path_matches() {
        let dispatcher = Dispatcher::new();
        match dispatcher.dispatch(&Method::GET, "/health") {
            Dispatch::Matched { route, .. } => assert_eq!(route, RouteName::Health),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn unknown_path_is_404() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(dispatcher.dispatch(&Method::GET, "/api/nope"), Dispatch::NotFound));
    }

    #[test]
    fn wrong_method_on_known_path_is_405_with_allow() {
        let dispatcher = Dispatcher::new();
        match dispatcher.dispatch(&Method::DELETE, "/api/order") {
            Dispatch::MethodNotAllowed { allowed } => {
                assert!(allowed.contains("POST"));
                assert_eq!(allow_header_value(&allowed), "OPTIONS, POST");
            }
            _ => panic!("expected 405"),
        }
    }

    #[test]
    fn options_on_known_path_lists_allowed_methods() {
        let dispatcher = Dispatcher::new();
        match dispatcher.dispatch(&Method::OPTIONS, "/api/config") {
            Dispatch::Options { allowed } => {
                assert!(allowed.contains("GET"));
                assert!(allowed.contains("POST"));
            }
            _ => panic!("expected options listing"),
        }
    }

    #[test]
    fn options_on_unknown_path_is_404() {
        let dispatcher = Dispatcher::new();
        assert!(matches!(dispatcher.dispatch(&Method::OPTIONS, "/nope"), Dispatch::NotFound));
    }
}

//! Route handlers, dispatched from the custom entry point in
//! `middleware.rs` once a request has passed the chain. Each handler is a
//! plain async function taking the already-matched route's params and the
//! full request, so GET query and POST JSON extraction is done by hand
//! via axum's extractors rather than through `Router::route` registration.

use crate::auth::AuthInfo;
use crate::dispatcher::RouteName;
use crate::error::{internal, invalid_input, not_found};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{FromRequest, Json, Query, Request};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use common::types::{Px, Qty, Side, Symbol};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use veloz_broadcaster::Replay;

pub async fn dispatch(route: RouteName, app: AppState, auth: AuthInfo, req: Request<Body>) -> Response {
    match route {
        RouteName::Health => health(),
        RouteName::ApiHealth => api_health(app).await,
        RouteName::Market => market(app, req).await,
        RouteName::Orders => orders(app, req).await,
        RouteName::Order => place_order(app, auth, req).await,
        RouteName::Cancel => cancel_order(app, req).await,
        RouteName::OrderState => order_state(app, req).await,
        RouteName::Stream => stream(app, req.headers().clone()).await,
        RouteName::Account => account(app).await,
        RouteName::ConfigGet => config_get(app),
        RouteName::ConfigPost => config_post(req).await,
        RouteName::Metrics => metrics_handler(),
    }
}

fn health() -> Response {
    axum::Json(serde_json::json!({"ok": true})).into_response()
}

#[derive(Serialize)]
struct ApiHealthBody {
    ok: bool,
    engine_connected: bool,
    uptime_secs: u64,
    subscriber_count: usize,
}

async fn api_health(app: AppState) -> Response {
    let body = ApiHealthBody {
        ok: true,
        engine_connected: app.bridge.is_alive(),
        uptime_secs: app.start_time.elapsed().as_secs(),
        subscriber_count: app.broadcaster.subscription_count(),
    };
    axum::Json(body).into_response()
}

#[derive(Deserialize)]
struct MarketQuery {
    symbol: String,
}

async fn market(app: AppState, req: Request<Body>) -> Response {
    let query = match Query::<MarketQuery>::try_from_uri(req.uri()) {
        Ok(Query(query)) => query,
        Err(err) => return invalid_input(err.to_string()),
    };
    match app.caches.market.lock().get(&query.symbol).copied() {
        Some(snapshot) => axum::Json(snapshot).into_response(),
        None => not_found(format!("no market data for {}", query.symbol)),
    }
}

#[derive(Deserialize)]
struct OrdersQuery {
    status: Option<String>,
}

async fn orders(app: AppState, req: Request<Body>) -> Response {
    let query = Query::<OrdersQuery>::try_from_uri(req.uri()).map(|Query(q)| q).unwrap_or(OrdersQuery { status: None });
    let orders = app.caches.orders.lock();
    let list: Vec<_> = orders
        .values()
        .filter(|o| query.status.as_deref().is_none_or(|status| o.status == status))
        .cloned()
        .collect();
    axum::Json(list).into_response()
}

#[derive(Deserialize)]
struct PlaceOrderBody {
    client_order_id: String,
    symbol: u32,
    side: Side,
    qty: f64,
    price: Option<f64>,
}

async fn place_order(app: AppState, auth: AuthInfo, req: Request<Body>) -> Response {
    let body = match Json::<PlaceOrderBody>::from_request(req, &()).await {
        Ok(Json(body)) => body,
        Err(err) => return invalid_input(err.to_string()),
    };
    if body.qty <= 0.0 {
        return invalid_input("qty must be positive");
    }
    if body.client_order_id.is_empty() {
        return invalid_input("client_order_id must not be empty");
    }

    // A duplicate place with a live id is idempotent (spec §7): the cache
    // already holds the original ack, so short-circuit without re-sending.
    if let Some(existing) = app.caches.orders.lock().get(&body.client_order_id).cloned() {
        if existing.status != "rejected" && existing.status != "canceled" {
            tracing::debug!(client_order_id = %body.client_order_id, client = %auth.client_id, "idempotent replay of existing order");
            return axum::Json(existing).into_response();
        }
    }

    let symbol = Symbol::new(body.symbol);
    let qty = Qty::new(body.qty);
    let result = match body.price {
        Some(price) => app.bridge.send_place_limit(body.side, symbol, qty, Px::new(price), &body.client_order_id),
        None => app.bridge.send_place_market(body.side, symbol, qty, &body.client_order_id),
    };
    match result {
        Ok(()) => (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"client_order_id": body.client_order_id, "status": "pending"}))).into_response(),
        Err(err) => internal(err.to_string()),
    }
}

#[derive(Deserialize)]
struct CancelBody {
    client_order_id: String,
}

async fn cancel_order(app: AppState, req: Request<Body>) -> Response {
    let body = match Json::<CancelBody>::from_request(req, &()).await {
        Ok(Json(body)) => body,
        Err(err) => return invalid_input(err.to_string()),
    };
    match app.caches.orders.lock().get(&body.client_order_id).map(|o| o.status.clone()) {
        Some(status) if status == "canceled" => {
            return axum::Json(serde_json::json!({"client_order_id": body.client_order_id, "reason": "already_canceled"})).into_response();
        }
        None => return not_found(format!("unknown client order id: {}", body.client_order_id)),
        _ => {}
    }
    match app.bridge.send_cancel(&body.client_order_id) {
        Ok(()) => (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"client_order_id": body.client_order_id, "status": "cancel_pending"}))).into_response(),
        Err(err) => internal(err.to_string()),
    }
}

#[derive(Deserialize)]
struct OrderStateQuery {
    client_order_id: String,
}

async fn order_state(app: AppState, req: Request<Body>) -> Response {
    let query = match Query::<OrderStateQuery>::try_from_uri(req.uri()) {
        Ok(Query(query)) => query,
        Err(err) => return invalid_input(err.to_string()),
    };
    match app.caches.orders.lock().get(&query.client_order_id).cloned() {
        Some(snapshot) => axum::Json(snapshot).into_response(),
        None => not_found(format!("unknown client order id: {}", query.client_order_id)),
    }
}

fn sse_event_from(event: &veloz_broadcaster::Event) -> SseEvent {
    SseEvent::default().id(event.id.to_string()).data(event.payload.to_string())
}

async fn stream(app: AppState, headers: HeaderMap) -> Response {
    let last_id = headers.get("last-event-id").and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<u64>().ok());
    let subscription = app.broadcaster.subscribe(last_id);
    let (initial, gap) = match subscription.replay {
        Replay::Events(events) => (events, false),
        Replay::Gap => (Vec::new(), true),
    };

    let mut prefix: Vec<SseEvent> = Vec::with_capacity(initial.len() + 1);
    if gap {
        prefix.push(SseEvent::default().event("gap").data("missed events precede retained history; reconcile via REST"));
    }
    prefix.extend(initial.iter().map(sse_event_from));

    let (tx, rx) = tokio::sync::mpsc::channel::<veloz_broadcaster::Event>(64);
    let broadcaster = app.broadcaster.clone();
    let handle = subscription.handle;
    let receiver = subscription.receiver;
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = receiver.recv() {
            if tx.blocking_send(event).is_err() {
                break;
            }
        }
        broadcaster.unsubscribe(handle);
    });

    let live = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (sse_event_from(&event), rx)) });
    let combined = futures_util::stream::iter(prefix).chain(live).map(Ok::<_, Infallible>);

    Sse::new(combined).keep_alive(KeepAlive::default()).into_response()
}

async fn account(app: AppState) -> Response {
    axum::Json(*app.caches.account.lock()).into_response()
}

#[derive(Serialize)]
struct RedactedConfig {
    server_host: String,
    server_port: u16,
    env: String,
    rate_limit_capacity: u64,
    rate_limit_refill_per_sec: u64,
    cors_allowed_origin: String,
}

fn config_get(app: AppState) -> Response {
    axum::Json(RedactedConfig {
        server_host: app.config.server.host.clone(),
        server_port: app.config.server.port,
        env: app.config.env.clone(),
        rate_limit_capacity: app.config.rate_limit.capacity,
        rate_limit_refill_per_sec: app.config.rate_limit.refill_per_sec,
        cors_allowed_origin: app.config.cors.allowed_origin.clone(),
    })
    .into_response()
}

/// Accepts a configuration delta and validates it parses as JSON, but does
/// not hot-reload the running process: live config mutation semantics are
/// not specified (spec §9 leaves role/config management at field level
/// unresolved), so this only confirms receipt.
async fn config_post(req: Request<Body>) -> Response {
    match Json::<serde_json::Value>::from_request(req, &()).await {
        Ok(Json(_)) => (StatusCode::ACCEPTED, axum::Json(serde_json::json!({"accepted": true}))).into_response(),
        Err(err) => invalid_input(err.to_string()),
    }
}

fn metrics_handler() -> Response {
    let body = crate::metrics::render();
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

//! The C12 middleware chain: metrics → CORS → rate limit → auth → audit →
//! handler, run in that registration order for every dispatched request.
//! Implemented as one entry function rather than a `tower` layer stack so
//! the short-circuit-or-continue semantics per spec §4.11 stay explicit,
//! the way the teacher's `middleware.rs` documents its own chain even
//! though it then wires it up as separate `from_fn_with_state` layers.

use crate::dispatcher::{allow_header_value, Dispatch, Dispatcher};
use crate::error::error_response;
use crate::state::AppState;
use crate::{auth, handlers};
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use common::errors::ErrorKind;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;

static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

fn dispatcher() -> &'static Dispatcher {
    DISPATCHER.get_or_init(Dispatcher::new)
}

fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
        .unwrap_or_else(|| remote.ip().to_string())
}

/// The single route every request passes through; everything downstream
/// (axum's own `Router`) is just this one `fallback`.
pub async fn entry(State(app): State<AppState>, ConnectInfo(remote): ConnectInfo<SocketAddr>, req: Request<Body>) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();

    // metrics: every outcome, including short-circuits, is recorded below
    // via `finish`, so this stage only starts the clock.

    let dispatch = dispatcher().dispatch(&method, &path);

    let response = match dispatch {
        Dispatch::NotFound => error_response(&ErrorKind::NotFound(path.clone())),
        Dispatch::Options { allowed } => {
            let mut response = StatusCode::OK.into_response();
            insert_allow(&mut response, &allowed);
            response
        }
        Dispatch::MethodNotAllowed { allowed } => {
            let mut response = method_not_allowed_response();
            insert_allow(&mut response, &allowed);
            response
        }
        Dispatch::Matched { route, params } => {
            let client_id = client_ip(&headers, remote);

            let rate = app.rate_limiter.check(&client_id, &path, 1);
            if !rate.allowed {
                crate::metrics::record_rate_limit_rejection(&path);
                error_response(&ErrorKind::RateLimited { retry_after_ms: rate.retry_after_ms })
            } else {
                let info = if auth::is_public_path(&path) {
                    auth::AuthInfo::anonymous(client_id.clone())
                } else {
                    app.authenticator.authenticate(&headers, &client_id)
                };

                let _ = params;
                let response = handlers::dispatch(route, app.clone(), info.clone(), req).await;

                app.audit.record(crate::audit::AuditEntry {
                    client_id: info.client_id,
                    method: method.to_string(),
                    path: path.clone(),
                    status: response.status().as_u16(),
                    timestamp: common::types::Ts::now().to_iso8601_millis(),
                });
                response
            }
        }
    };

    finish(response, &app, &method, &path, start)
}

/// 405 is a dispatcher-level transport outcome, not one of the core error
/// kinds (spec §7's closed set), so its body is built directly rather than
/// through `error_response`.
fn method_not_allowed_response() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, axum::Json(serde_json::json!({"error": "method_not_allowed", "message": "method not allowed for this path"}))).into_response()
}

fn insert_allow(response: &mut Response, allowed: &std::collections::BTreeSet<String>) {
    if let Ok(value) = HeaderValue::from_str(&allow_header_value(allowed)) {
        response.headers_mut().insert(header::ALLOW, value);
    }
}

fn finish(mut response: Response, app: &AppState, method: &Method, path: &str, start: Instant) -> Response {
    crate::metrics::record_request(path, method.as_str(), response.status().as_u16());
    crate::metrics::record_latency(path, start.elapsed().as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&app.config.cors.allowed_origin) {
        response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, OPTIONS"));
    response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("content-type, x-api-key, last-event-id"));
    response
}

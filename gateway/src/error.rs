//! Maps the closed [`common::errors::ErrorKind`] taxonomy to HTTP
//! responses (spec §7): `{"error": "<kind>", "message": "..."}`, with
//! `Retry-After` attached for `RateLimited`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use common::errors::ErrorKind;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[must_use]
pub fn error_response(kind: &ErrorKind) -> Response {
    let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody { error: kind.tag(), message: kind.to_string() };
    let mut response = (status, axum::Json(body)).into_response();
    if let ErrorKind::RateLimited { retry_after_ms } = kind {
        if let Ok(value) = header::HeaderValue::from_str(&retry_after_ms.div_ceil(1000).to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

#[must_use]
pub fn invalid_input(message: impl Into<String>) -> Response {
    error_response(&ErrorKind::InvalidInput(message.into()))
}

#[must_use]
pub fn not_found(message: impl Into<String>) -> Response {
    error_response(&ErrorKind::NotFound(message.into()))
}

#[must_use]
pub fn internal(message: impl Into<String>) -> Response {
    error_response(&ErrorKind::Internal(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as S;

    #[test]
    fn maps_invalid_input_to_400() {
        let response = invalid_input("bad qty");
        assert_eq!(response.status(), S::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = error_response(&ErrorKind::RateLimited { retry_after_ms: 2500 });
        assert_eq!(response.status(), S::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "3");
    }
}

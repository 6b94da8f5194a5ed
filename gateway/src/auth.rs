//! Authentication contract boundary.
//!
//! Full JWT verification, refresh, and role management are out of scope
//! (spec §1: "Authentication and audit logging are treated as middleware
//! contracts, not specified in depth"). This module fixes the shape the
//! rest of the chain depends on — `AuthInfo` on the request, a public-path
//! allowlist — behind a trait so a real verifier can be dropped in without
//! touching the dispatcher or handlers.

use axum::http::HeaderMap;

/// Identity attached to the request by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub client_id: String,
    pub authenticated: bool,
}

impl AuthInfo {
    #[must_use]
    pub fn anonymous(client_id: String) -> Self {
        Self { client_id, authenticated: false }
    }
}

/// Authenticates a request into an [`AuthInfo`]. Never fails the request by
/// itself; an unauthenticated caller is represented, not rejected — routes
/// that require authentication enforce that in their own handler.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap, fallback_client_id: &str) -> AuthInfo;
}

/// Accepts an `X-Api-Key` header as the client identity; everything else is
/// anonymous, keyed by the caller-supplied fallback (typically the client
/// IP). This is the stub the contract boundary requires, not a credential
/// store.
#[derive(Debug, Default)]
pub struct HeaderKeyAuthenticator;

impl Authenticator for HeaderKeyAuthenticator {
    fn authenticate(&self, headers: &HeaderMap, fallback_client_id: &str) -> AuthInfo {
        match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            Some(key) if !key.is_empty() => AuthInfo { client_id: key.to_string(), authenticated: true },
            _ => AuthInfo::anonymous(fallback_client_id.to_string()),
        }
    }
}

/// Paths the auth middleware never challenges, regardless of credentials.
pub const PUBLIC_PATHS: &[&str] = &["/health", "/metrics"];

#[must_use]
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_header_authenticates() {
        let auth = HeaderKeyAuthenticator;
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "k1".parse().unwrap());
        let info = auth.authenticate(&headers, "1.2.3.4");
        assert!(info.authenticated);
        assert_eq!(info.client_id, "k1");
    }

    #[test]
    fn missing_header_falls_back_to_anonymous() {
        let auth = HeaderKeyAuthenticator;
        let info = auth.authenticate(&HeaderMap::new(), "1.2.3.4");
        assert!(!info.authenticated);
        assert_eq!(info.client_id, "1.2.3.4");
    }

    #[test]
    fn health_and_metrics_are_public() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/metrics"));
        assert!(!is_public_path("/api/order"));
    }
}

//! The closed error taxonomy shared by every VeloZ crate.
//!
//! Each crate owns a narrower `thiserror` enum for internal matching and
//! converts into [`ErrorKind`] at its public boundary, mirroring the way
//! service-level errors collapse into a single taxonomy before crossing a
//! process boundary elsewhere in this codebase.

use thiserror::Error;

/// Reasons a venue adapter rejected an order, independent of the venue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectKind {
    #[error("invalid symbol")]
    InvalidSymbol,
    #[error("invalid quantity")]
    InvalidQty,
    #[error("invalid price")]
    InvalidPrice,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("rate limited by venue")]
    RateLimited,
    #[error("venue unreachable")]
    VenueDown,
    #[error("duplicate id")]
    DuplicateId,
    #[error("other: {0} {1}")]
    Other(i32, String),
}

impl RejectKind {
    /// `true` for reject kinds the execution adapter should retry with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::VenueDown)
    }
}

/// The closed set of error kinds every component boundary converts into.
///
/// This is the single enum the gateway maps to HTTP status codes; it is
/// deliberately closed (no `Other` catch-all beyond `Internal`) so that
/// mapping stays exhaustive.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("wal unavailable: {0}")]
    WalUnavailable(String),

    #[error("wal corrupt: {0}")]
    WalCorrupt(String),

    #[error("risk check rejected: {0}")]
    RiskReject(String),

    #[error("circuit open")]
    CircuitOpen,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("venue reject: {0}")]
    VenueReject(#[from] RejectKind),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("slow consumer")]
    SlowConsumer,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// The machine-readable tag used in the `{"error":"<kind>",...}` HTTP
    /// body and in structured log fields.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::DuplicateClientOrderId(_) => "duplicate_client_order_id",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::SequenceGap { .. } => "sequence_gap",
            Self::WalUnavailable(_) => "wal_unavailable",
            Self::WalCorrupt(_) => "wal_corrupt",
            Self::RiskReject(_) => "risk_reject",
            Self::CircuitOpen => "circuit_open",
            Self::RateLimited { .. } => "rate_limited",
            Self::VenueReject(_) => "venue_reject",
            Self::Timeout(_) => "timeout",
            Self::SlowConsumer => "slow_consumer",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal(_) => "internal",
        }
    }

    /// The HTTP status code the gateway maps this error kind to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::DuplicateClientOrderId(_) => 400,
            Self::InvalidTransition(_) | Self::SequenceGap { .. } => 400,
            Self::RateLimited { .. } => 429,
            Self::CircuitOpen | Self::WalUnavailable(_) => 503,
            Self::Timeout(_) => 504,
            Self::RiskReject(_) | Self::VenueReject(_) => 422,
            Self::SlowConsumer => 503,
            Self::WalCorrupt(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_spec() {
        assert_eq!(ErrorKind::InvalidInput("x".into()).http_status(), 400);
        assert_eq!(ErrorKind::NotFound("x".into()).http_status(), 404);
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(
            ErrorKind::RateLimited { retry_after_ms: 100 }.http_status(),
            429
        );
        assert_eq!(ErrorKind::CircuitOpen.http_status(), 503);
        assert_eq!(ErrorKind::WalUnavailable("x".into()).http_status(), 503);
        assert_eq!(ErrorKind::Timeout("x".into()).http_status(), 504);
        assert_eq!(ErrorKind::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn reject_kind_retryability() {
        assert!(RejectKind::VenueDown.is_retryable());
        assert!(RejectKind::RateLimited.is_retryable());
        assert!(!RejectKind::InvalidSymbol.is_retryable());
        assert!(!RejectKind::DuplicateId.is_retryable());
    }
}

//! Prometheus metrics exposition via the `metrics`/`metrics-exporter-
//! prometheus` crates, replacing the teacher's hand-rolled text builder in
//! `handlers/health.rs::metrics()` with the facade the rest of this crate
//! records against (`metrics::counter!`/`histogram!`).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global recorder once at startup.
///
/// # Panics
/// Panics if called more than once per process.
pub fn install() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder installs exactly once at startup");
    HANDLE.set(handle).expect("metrics::install called more than once");
}

/// Render the current exposition text for `/metrics`. Empty until
/// `install` has run.
#[must_use]
pub fn render() -> String {
    HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

pub fn record_request(route: &str, method: &str, status: u16) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

pub fn record_latency(route: &str, elapsed_secs: f64) {
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string()).record(elapsed_secs);
}

pub fn record_rate_limit_rejection(route: &str) {
    metrics::counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

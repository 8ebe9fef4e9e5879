//! Metrics collection and exposition.
//!
//! # Metrics
//! - `integrations_logins_total` (counter): login exchanges by outcome
//! - `integrations_reauth_total` (counter): re-logins triggered by a 401
//! - `integrations_upstream_requests_total` (counter): upstream calls by service, status
//! - `integrations_retries_total` (counter): backoff retries by operation
//! - `integrations_lookup_cache_total` (counter): cache hit/miss/stale/degraded by endpoint
//! - `integrations_single_flight_joined_total` (counter): callers that joined a pending call
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Labels are low-cardinality (no cache keys, no URLs)

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_login(outcome: &'static str) {
    counter!("integrations_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_reauth() {
    counter!("integrations_reauth_total").increment(1);
}

pub fn record_upstream_request(service: &'static str, status: Option<u16>) {
    let status = status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "error".to_string());
    counter!("integrations_upstream_requests_total", "service" => service, "status" => status)
        .increment(1);
}

pub fn record_retry(operation: &str) {
    counter!("integrations_retries_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_cache_result(endpoint: &str, result: &'static str) {
    counter!(
        "integrations_lookup_cache_total",
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_single_flight_join(flight: &'static str) {
    counter!("integrations_single_flight_joined_total", "flight" => flight).increment(1);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_errors_total` (counter): dispatch failures by kind
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations in the recorder)
//! - The route label is the deterministic route name, "none" when no route
//!   matched

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed (or failed) request.
pub fn record_request(method: &str, route: &str, status: u16, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record a dispatch failure by taxonomy kind.
pub fn record_gateway_error(kind: &'static str) {
    counter!("gateway_errors_total", "kind" => kind).increment(1);
}

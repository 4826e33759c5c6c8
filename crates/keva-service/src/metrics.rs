//! Metrics collection and export for Keva.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use keva_protocol::{EventKind, Status, Verb};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "keva_requests_total";
    pub const EVENTS_TOTAL: &str = "keva_events_total";
    pub const SUBSCRIPTIONS_TOTAL: &str = "keva_subscriptions_total";
    pub const STORE_ENTRIES: &str = "keva_store_entries";
    pub const LATENCY_SECONDS: &str = "keva_request_latency_seconds";
    pub const ERRORS_TOTAL: &str = "keva_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of requests dispatched, by verb and status"
    );
    metrics::describe_counter!(
        names::EVENTS_TOTAL,
        "Total number of change events emitted, by kind"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_TOTAL,
        "Total number of subscription bindings installed"
    );
    metrics::describe_gauge!(names::STORE_ENTRIES, "Current number of stored entries");
    metrics::describe_histogram!(
        names::LATENCY_SECONDS,
        "Request dispatch latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a dispatched request.
pub fn record_request(verb: Verb, status: Status) {
    counter!(
        names::REQUESTS_TOTAL,
        "verb" => verb.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an emitted change event.
pub fn record_event(kind: EventKind) {
    counter!(names::EVENTS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a subscription binding.
pub fn record_subscription() {
    counter!(names::SUBSCRIPTIONS_TOTAL).increment(1);
}

/// Update the stored entry count.
pub fn set_store_entries(count: usize) {
    gauge!(names::STORE_ENTRIES).set(count as f64);
}

/// Record dispatch latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

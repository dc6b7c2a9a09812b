//! Metrics collection and exposition.
//!
//! # Metrics
//! - `plughost_requests_rejected_total{stage}` (counter): requests refused by a pipeline stage
//! - `plughost_log_events_dropped_total` (counter): records shed by the async log queue
//! - `plughost_hooks_executed_total` (counter): startup hooks that completed
//! - `plughost_requests_in_flight` (gauge): requests inside the graceful gate
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - The Prometheus exporter is opt-in (`observability.metrics_enabled`)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// A pipeline stage refused a request (`method`, `limit`, `shutdown`).
pub fn record_rejected(stage: &'static str) {
    metrics::counter!("plughost_requests_rejected_total", "stage" => stage).increment(1);
}

pub fn record_log_event_dropped() {
    metrics::counter!("plughost_log_events_dropped_total").increment(1);
}

pub fn record_hook_executed(hook: &str) {
    metrics::counter!("plughost_hooks_executed_total", "hook" => hook.to_string()).increment(1);
}

pub fn set_in_flight(count: usize) {
    metrics::gauge!("plughost_requests_in_flight").set(count as f64);
}

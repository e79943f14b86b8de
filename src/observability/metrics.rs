//! Metrics collection and exposition.
//!
//! # Metrics
//! - `contextual_requests_total` (counter): requests by method, status
//! - `contextual_request_duration_seconds` (histogram): latency distribution
//! - `contextual_classifications_total` (counter): outcomes by state
//! - `contextual_tag_registry_refreshes_total` (counter): snapshot rebuilds
//! - `contextual_rewritten_responses_total` (counter): HTML bodies rewritten
//! - `contextual_rewritten_tags_total` (counter): tags substituted across them

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "contextual_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("contextual_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_classification(outcome: &'static str) {
    counter!("contextual_classifications_total", "outcome" => outcome).increment(1);
}

pub fn record_registry_refresh() {
    counter!("contextual_tag_registry_refreshes_total").increment(1);
}

pub fn record_rewrite(tags: usize) {
    counter!("contextual_rewritten_responses_total").increment(1);
    counter!("contextual_rewritten_tags_total").increment(tags as u64);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_messages_total` (counter): ingested messages by protocol
//! - `relay_replies_failed_total` (counter): replies that could not be sent, by protocol
//! - `relay_active_connections` (gauge): in-flight stream connections
//! - `relay_subscribers` (gauge): connected push subscribers
//! - `relay_broadcast_deliveries_total` / `relay_broadcast_failures_total` (counters)
//! - `relay_lifecycle_transitions_total` (counter): state changes by target state
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless `init_metrics` runs.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::hub::{BroadcastReport, Protocol};
use crate::lifecycle::ServerState;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_message(protocol: Protocol) {
    metrics::counter!("relay_messages_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_reply_failure(protocol: Protocol) {
    metrics::counter!("relay_replies_failed_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("relay_active_connections").set(count as f64);
}

pub fn set_subscribers(count: usize) {
    metrics::gauge!("relay_subscribers").set(count as f64);
}

pub fn record_broadcast(report: &BroadcastReport) {
    metrics::counter!("relay_broadcast_deliveries_total").increment(report.delivered as u64);
    if report.failed > 0 {
        metrics::counter!("relay_broadcast_failures_total").increment(report.failed as u64);
    }
}

pub fn record_transition(to: ServerState) {
    metrics::counter!("relay_lifecycle_transitions_total", "to" => to.as_str()).increment(1);
}

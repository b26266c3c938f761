//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_reloads_total` (counter): reloads by outcome
//!   (`published`, `unchanged`, `failed`)
//! - `route_reload_duration_seconds` (histogram): batch arrival to idle
//! - `route_generation` (gauge): published generation number
//! - `route_table_routes` (gauge): routes in the published generation
//! - `route_store_errors_total` (counter): skipped store mutations
//! - `route_change_events_total` (counter): received events by kind
//! - `route_validation_errors_total` (counter): rejected route sets
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests quiet

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::events::ChangeBatch;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter started");
    Ok(())
}

pub fn record_reload(outcome: &'static str, started: Instant) {
    metrics::counter!("route_reloads_total", "outcome" => outcome).increment(1);
    metrics::histogram!("route_reload_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_generation(number: u64, routes: usize) {
    metrics::gauge!("route_generation").set(number as f64);
    metrics::gauge!("route_table_routes").set(routes as f64);
}

pub fn record_store_error() {
    metrics::counter!("route_store_errors_total").increment(1);
}

pub fn record_validation_errors(count: usize) {
    metrics::counter!("route_validation_errors_total").increment(count as u64);
}

pub fn record_change_events(batch: &ChangeBatch) {
    for event in batch.events() {
        metrics::counter!("route_change_events_total", "kind" => event.kind().as_str()).increment(1);
    }
}

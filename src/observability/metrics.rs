//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mfe_router_dispatch_total` (counter): router dispatches by rule, status
//! - `mfe_router_dispatch_duration_seconds` (histogram): time spent in the target
//! - `mfe_router_rules` (gauge): live rule count
//! - `mfe_edge_requests_total` (counter): edge requests by origin, cache outcome, status
//! - `mfe_edge_cache_entries` (gauge): cached static responses
//! - `mfe_registry_writes_total` (counter): successful parameter writes
//! - `mfe_assets_published_total` (counter): uploaded assets by service
//! - `mfe_target_live` (gauge): 1=live, 0=not yet ready
//!
//! Recording without an installed recorder is a no-op, so tests never set one.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(rule: &str, status: u16, start: Instant) {
    metrics::counter!(
        "mfe_router_dispatch_total",
        "rule" => rule.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mfe_router_dispatch_duration_seconds", "rule" => rule.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_count(count: usize) {
    metrics::gauge!("mfe_router_rules").set(count as f64);
}

pub fn record_edge_request(origin: &'static str, cache: &'static str, status: u16) {
    metrics::counter!(
        "mfe_edge_requests_total",
        "origin" => origin,
        "cache" => cache,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_cache_entries(count: usize) {
    metrics::gauge!("mfe_edge_cache_entries").set(count as f64);
}

pub fn record_registry_write() {
    metrics::counter!("mfe_registry_writes_total").increment(1);
}

pub fn record_assets_published(service: &str, count: usize) {
    metrics::counter!("mfe_assets_published_total", "service" => service.to_string())
        .increment(count as u64);
}

pub fn record_target_live(target: &str, live: bool) {
    metrics::gauge!("mfe_target_live", "target" => target.to_string())
        .set(if live { 1.0 } else { 0.0 });
}

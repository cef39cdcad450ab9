//! Metrics collection and exposition.
//!
//! # Metrics
//! - `modproxy_requests_total` (counter): requests by kind, status
//! - `modproxy_request_duration_seconds` (histogram): latency by kind
//! - `modproxy_fetch_total` (counter): fetch attempts by source, outcome
//! - `modproxy_fallback_total` (counter): upstream failures recovered locally
//! - `modproxy_materialize_total` (counter): toolchain downloads by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Low-cardinality labels only; module addresses are never labels

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::fetch::Source;
use crate::module::RequestKind;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(kind: RequestKind, status: u16, start: Instant) {
    let kind = kind.as_str();
    counter!("modproxy_requests_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
    histogram!("modproxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

/// Record one fetch attempt.
pub fn record_fetch(source: Source, outcome: &'static str) {
    counter!("modproxy_fetch_total", "source" => source.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Record a fallback from upstream to local.
pub fn record_fallback(kind: RequestKind) {
    counter!("modproxy_fallback_total", "kind" => kind.as_str()).increment(1);
}

/// Record a toolchain download.
pub fn record_materialize(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("modproxy_materialize_total", "outcome" => outcome).increment(1);
}

//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the operation metrics
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `sqlscope_operations_total` (counter): completed operations by `operation`
//! - `sqlscope_operation_duration_seconds` (histogram): backend call latency by `operation`
//! - `sqlscope_query_duration_seconds` (histogram): traced query latency by `kind`, `outcome`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are static strings, so recording never allocates label values

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::observer::Hook;

pub const OPERATIONS_TOTAL: &str = "sqlscope_operations_total";
pub const OPERATION_DURATION_SECONDS: &str = "sqlscope_operation_duration_seconds";
pub const QUERY_DURATION_SECONDS: &str = "sqlscope_query_duration_seconds";

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one completed operation and, when known, its backend latency.
pub fn record_operation(operation: Hook, elapsed: Option<Duration>) {
    counter!(OPERATIONS_TOTAL, "operation" => operation.name()).increment(1);
    if let Some(elapsed) = elapsed {
        histogram!(OPERATION_DURATION_SECONDS, "operation" => operation.name())
            .record(elapsed.as_secs_f64());
    }
}

/// Record the latency of a traced query, successful or not.
pub fn record_query(kind: &'static str, outcome: &'static str, elapsed: Duration) {
    histogram!(QUERY_DURATION_SECONDS, "kind" => kind, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

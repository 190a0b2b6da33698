//! Store metrics collection.

use std::time::Instant;

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total store operations by operation and outcome.
    pub const OPERATIONS_TOTAL: &str = "vgate_store_operations_total";

    /// Operation latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vgate_store_latency_seconds";
}

/// Record a completed store operation.
pub fn record_operation(operation: &'static str, ok: bool, started: Instant) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation
    )
    .record(started.elapsed().as_secs_f64());
}

//! Dispatch metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Chunks that reached a final outcome in a dispatch, by outcome.
    pub const CHUNKS_DISPATCHED_TOTAL: &str = "vgate_chunks_dispatched_total";

    /// Recognizer retries scheduled.
    pub const CHUNK_RETRIES_TOTAL: &str = "vgate_chunk_retries_total";

    /// Chunks failed by the watchdog.
    pub const CHUNK_TIMEOUTS_TOTAL: &str = "vgate_chunk_timeouts_total";
}

/// Record a chunk outcome (`done`, `failed`, `skipped`, `cancelled`).
pub fn record_chunk_outcome(outcome: &'static str) {
    counter!(names::CHUNKS_DISPATCHED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    counter!(names::CHUNK_RETRIES_TOTAL).increment(1);
}

pub fn record_timeout() {
    counter!(names::CHUNK_TIMEOUTS_TOTAL).increment(1);
}

//! Analysis configuration.
//!
//! Every value here is a tunable default, not part of the request contract.

use std::time::Duration;

use crate::retry::BackoffPolicy;

/// Dispatch and aggregation configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Retry/backoff policy for recognizer calls
    pub backoff: BackoffPolicy,
    /// Maximum chunks dispatched concurrently within one request
    pub dispatch_concurrency: usize,
    /// Watchdog budget for a single chunk, retries included
    pub chunk_timeout: Duration,
    /// Largest gap (seconds) between two sightings that still merges them
    pub adjacency_gap_secs: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            dispatch_concurrency: 4,
            chunk_timeout: Duration::from_secs(60),
            adjacency_gap_secs: 2.0,
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            backoff: BackoffPolicy::from_env(),
            dispatch_concurrency: std::env::var("VGATE_DISPATCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(4),
            chunk_timeout: Duration::from_secs(
                std::env::var("VGATE_CHUNK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            adjacency_gap_secs: std::env::var("VGATE_ADJACENCY_GAP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|g: &f64| g.is_finite() && *g >= 0.0)
                .unwrap_or(2.0),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.dispatch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_adjacency_gap(mut self, gap_secs: f64) -> Self {
        self.adjacency_gap_secs = gap_secs;
        self
    }
}

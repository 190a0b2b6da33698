//! Video analysis core.
//!
//! This crate provides:
//! - Chunk identity resolution
//! - Chunk dispatch with retry/backoff, bounded concurrency and a watchdog
//! - Pre-dispatch cancellation
//! - Aggregation of detections into per-person timelines
//! - `AnalysisPipeline`, the facade used by the HTTP layer

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod locks;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod resolver;
pub mod retry;

pub use aggregator::{AggregationOutcome, Aggregator};
pub use cancel::{CancelOutcome, CancelRegistry};
pub use config::AnalysisConfig;
pub use dispatcher::{ChunkFailure, DispatchOutcome, Dispatcher, SkipReason};
pub use error::{AnalysisError, AnalysisResult};
pub use logging::ChunkLogger;
pub use pipeline::{AnalysisPipeline, Progress, ProcessOutcome, Readiness, VideoSnapshot};
pub use resolver::{ResolvedTarget, Resolver, TargetMode};
pub use retry::BackoffPolicy;

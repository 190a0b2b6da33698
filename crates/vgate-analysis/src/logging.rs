//! Structured chunk logging utilities.

use tracing::{error, info, warn, Span};
use vgate_models::{ChunkId, VideoId};

/// Logger carrying the video/chunk context of one dispatch.
#[derive(Debug, Clone)]
pub struct ChunkLogger {
    video_id: String,
    chunk_id: String,
    operation: &'static str,
}

impl ChunkLogger {
    pub fn new(video_id: &VideoId, chunk_id: &ChunkId, operation: &'static str) -> Self {
        Self {
            video_id: video_id.to_string(),
            chunk_id: chunk_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            chunk_id = %self.chunk_id,
            operation = self.operation,
            "Chunk started: {}", message
        );
    }

    /// Log a failed attempt that will be retried.
    pub fn log_retry(&self, attempt: u32, delay_ms: u64, message: &str) {
        warn!(
            video_id = %self.video_id,
            chunk_id = %self.chunk_id,
            operation = self.operation,
            attempt,
            delay_ms,
            "Chunk attempt failed, retrying: {}", message
        );
    }

    pub fn log_failure(&self, attempts: u32, message: &str) {
        error!(
            video_id = %self.video_id,
            chunk_id = %self.chunk_id,
            operation = self.operation,
            attempts,
            "Chunk failed: {}", message
        );
    }

    pub fn log_completion(&self, detections: usize) {
        info!(
            video_id = %self.video_id,
            chunk_id = %self.chunk_id,
            operation = self.operation,
            detections,
            "Chunk completed"
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    /// Create a tracing span for this chunk.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "chunk",
            video_id = %self.video_id,
            chunk_id = %self.chunk_id,
            operation = self.operation
        )
    }
}

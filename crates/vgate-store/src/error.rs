//! Store error types.

use thiserror::Error;
use vgate_models::{ChunkId, ChunkStatus, VideoId};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Video not found: {0}")]
    VideoNotFound(VideoId),

    #[error("Chunk {chunk_id} not found in video {video_id}")]
    ChunkNotFound { video_id: VideoId, chunk_id: ChunkId },

    #[error("Chunk {chunk_id} cannot move from {from} to {to}")]
    InvalidTransition {
        chunk_id: ChunkId,
        from: ChunkStatus,
        to: ChunkStatus,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn chunk_not_found(video_id: &VideoId, chunk_id: &ChunkId) -> Self {
        Self::ChunkNotFound {
            video_id: video_id.clone(),
            chunk_id: chunk_id.clone(),
        }
    }

    /// True for lookups of IDs the store does not hold.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::VideoNotFound(_) | StoreError::ChunkNotFound { .. }
        )
    }
}

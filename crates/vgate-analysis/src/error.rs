//! Analysis error taxonomy.
//!
//! Per-chunk recognizer failures are not errors at this level; they are
//! reported as `ChunkFailure` entries in the dispatch summary.

use thiserror::Error;
use vgate_store::StoreError;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Malformed request; surfaced to the caller, never retried
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown video
    #[error("{0}")]
    NotFound(String),

    /// Chunk does not belong to the video
    #[error("{0}")]
    InvalidReference(String),

    /// Requested transition is not legal for the chunk's current state
    #[error("{0}")]
    Conflict(String),

    /// Store or coordination failure; the whole request may be retried
    #[error("Internal fault: {0}")]
    InternalFault(String),
}

impl AnalysisError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalFault(msg.into())
    }

    /// True for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AnalysisError::InternalFault(_))
    }
}

impl From<StoreError> for AnalysisError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VideoNotFound(video_id) => {
                AnalysisError::NotFound(format!("Video {} not found", video_id))
            }
            StoreError::ChunkNotFound { video_id, chunk_id } => AnalysisError::InvalidReference(
                format!("Chunk {} does not belong to video {}", chunk_id, video_id),
            ),
            StoreError::InvalidTransition { chunk_id, from, to } => AnalysisError::Conflict(
                format!("Chunk {} is {}, cannot move to {}", chunk_id, from, to),
            ),
            other => AnalysisError::InternalFault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgate_models::ChunkStatus;

    #[test]
    fn test_store_error_mapping() {
        let err: AnalysisError = StoreError::VideoNotFound("v9".into()).into();
        assert!(matches!(err, AnalysisError::NotFound(_)));
        assert!(err.is_client_error());

        let err: AnalysisError = StoreError::chunk_not_found(&"v1".into(), &"c9".into()).into();
        assert!(matches!(err, AnalysisError::InvalidReference(_)));

        let err: AnalysisError = StoreError::InvalidTransition {
            chunk_id: "c1".into(),
            from: ChunkStatus::Done,
            to: ChunkStatus::Pending,
        }
        .into();
        assert!(matches!(err, AnalysisError::Conflict(_)));

        let err: AnalysisError = StoreError::unavailable("connection reset").into();
        assert!(matches!(err, AnalysisError::InternalFault(_)));
        assert!(!err.is_client_error());
    }
}

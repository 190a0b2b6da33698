//! Chunk identity resolution.

use std::sync::Arc;

use vgate_models::{Chunk, ChunkId, VideoId, MAX_ID_LEN};
use vgate_store::VideoStore;

use crate::error::{AnalysisError, AnalysisResult};

/// Which chunks a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    /// Every chunk that was pending at resolve time
    Batch,
    /// One explicitly named chunk
    Single(ChunkId),
}

/// A validated (video, chunks) reference ready for dispatch.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub video_id: VideoId,
    pub mode: TargetMode,
    pub chunks: Vec<Chunk>,
}

impl ResolvedTarget {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Validates and normalizes `(videoId, chunkId?)` references. Read-only.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn VideoStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    /// Resolve a request target.
    ///
    /// Without a chunk ID this is batch mode: all chunks pending right now.
    /// With one, the chunk must belong to the video; its status is not
    /// checked here.
    pub async fn resolve(&self, video_id: &str, chunk_id: Option<&str>) -> AnalysisResult<ResolvedTarget> {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(AnalysisError::NotFound("Video not found".to_string()));
        }
        if !is_valid_id(video_id) {
            return Err(AnalysisError::invalid_input("Invalid videoId format"));
        }

        let video_id = VideoId::from(video_id);
        let video = self
            .store
            .get_video(&video_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("Video {} not found", video_id)))?;

        match chunk_id.map(str::trim) {
            None => Ok(ResolvedTarget {
                chunks: video.pending_chunks(),
                video_id,
                mode: TargetMode::Batch,
            }),
            Some(raw) => {
                if raw.is_empty() || !is_valid_id(raw) {
                    return Err(AnalysisError::invalid_input("Invalid chunkId format"));
                }
                let chunk_id = ChunkId::from(raw);
                let chunk = video.chunk(&chunk_id).cloned().ok_or_else(|| {
                    AnalysisError::InvalidReference(format!(
                        "Chunk {} does not belong to video {}",
                        chunk_id, video_id
                    ))
                })?;

                Ok(ResolvedTarget {
                    video_id,
                    mode: TargetMode::Single(chunk_id),
                    chunks: vec![chunk],
                })
            }
        }
    }
}

/// Validate identifier format to keep IDs safe for logs and storage keys.
///
/// Valid: 1 to 128 characters of ASCII alphanumerics, `-`, `_`, `.` and `:`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

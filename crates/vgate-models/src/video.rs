//! Video models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chunk::{Chunk, ChunkId, ChunkStatus};

/// Maximum accepted length of a video or chunk identifier.
pub const MAX_ID_LEN: usize = 128;

/// Opaque, unique identifier of a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video processing status, derived from the statuses of its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Nothing has been dispatched yet
    #[default]
    Pending,
    /// Chunks are in flight, or outcomes are mixed without any success
    Processing,
    /// At least one chunk done and at least one failed or pending
    Partial,
    /// Every chunk done
    Complete,
    /// Every chunk failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Partial => "partial",
            VideoStatus::Complete => "complete",
            VideoStatus::Failed => "failed",
        }
    }

    /// Derive the video status from its chunk statuses.
    ///
    /// A video with no chunks, or whose chunks are all untouched, is `Pending`.
    pub fn from_chunks<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a ChunkStatus>,
    {
        let mut total = 0usize;
        let mut done = 0usize;
        let mut failed = 0usize;
        let mut pending = 0usize;

        for status in statuses {
            total += 1;
            match status {
                ChunkStatus::Done => done += 1,
                ChunkStatus::Failed => failed += 1,
                ChunkStatus::Pending => pending += 1,
                ChunkStatus::InFlight => {}
            }
        }

        if total == 0 || pending == total {
            VideoStatus::Pending
        } else if done == total {
            VideoStatus::Complete
        } else if failed == total {
            VideoStatus::Failed
        } else if done > 0 && (failed > 0 || pending > 0) {
            VideoStatus::Partial
        } else {
            VideoStatus::Processing
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video and its ordered chunks.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Unique video ID
    pub video_id: VideoId,

    /// Total duration in seconds
    #[serde(default)]
    pub duration_secs: f64,

    /// Chunks in playback order
    #[serde(default)]
    pub chunks: Vec<Chunk>,

    /// Processing status
    #[serde(default)]
    pub status: VideoStatus,

    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a new video with no chunks.
    pub fn new(video_id: impl Into<VideoId>, duration_secs: f64) -> Self {
        Self {
            video_id: video_id.into(),
            duration_secs,
            chunks: Vec::new(),
            status: VideoStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Append a chunk (builder style).
    pub fn with_chunk(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Look up a chunk by ID.
    pub fn chunk(&self, chunk_id: &ChunkId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| &c.chunk_id == chunk_id)
    }

    /// Mutable chunk lookup.
    pub fn chunk_mut(&mut self, chunk_id: &ChunkId) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|c| &c.chunk_id == chunk_id)
    }

    /// Chunks currently in `Pending` state, in order.
    pub fn pending_chunks(&self) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Pending)
            .cloned()
            .collect()
    }

    /// Recompute and store the derived status.
    pub fn refresh_status(&mut self) -> VideoStatus {
        self.status = VideoStatus::from_chunks(self.chunks.iter().map(|c| &c.status));
        self.updated_at = Utc::now();
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkSpan;

    fn statuses(list: &[ChunkStatus]) -> VideoStatus {
        VideoStatus::from_chunks(list.iter())
    }

    #[test]
    fn test_status_all_done_is_complete() {
        assert_eq!(
            statuses(&[ChunkStatus::Done, ChunkStatus::Done]),
            VideoStatus::Complete
        );
    }

    #[test]
    fn test_status_mixed_done_and_failed_is_partial() {
        assert_eq!(
            statuses(&[ChunkStatus::Done, ChunkStatus::Failed]),
            VideoStatus::Partial
        );
        assert_eq!(
            statuses(&[ChunkStatus::Done, ChunkStatus::Pending]),
            VideoStatus::Partial
        );
    }

    #[test]
    fn test_status_all_failed_is_failed() {
        assert_eq!(
            statuses(&[ChunkStatus::Failed, ChunkStatus::Failed]),
            VideoStatus::Failed
        );
    }

    #[test]
    fn test_status_otherwise_processing() {
        assert_eq!(
            statuses(&[ChunkStatus::InFlight, ChunkStatus::Done]),
            VideoStatus::Processing
        );
        assert_eq!(
            statuses(&[ChunkStatus::Failed, ChunkStatus::Pending]),
            VideoStatus::Processing
        );
    }

    #[test]
    fn test_status_untouched_is_pending() {
        assert_eq!(statuses(&[]), VideoStatus::Pending);
        assert_eq!(
            statuses(&[ChunkStatus::Pending, ChunkStatus::Pending]),
            VideoStatus::Pending
        );
    }

    #[test]
    fn test_pending_chunks_filters_by_status() {
        let mut video = Video::new("v1", 10.0)
            .with_chunk(Chunk::new("c1", "s3://v1/c1", ChunkSpan::time(0.0, 5.0)))
            .with_chunk(Chunk::new("c2", "s3://v1/c2", ChunkSpan::time(5.0, 10.0)));
        video.chunks[0].status = ChunkStatus::Done;

        let pending = video.pending_chunks();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].chunk_id.as_str(), "c2");
    }

    #[test]
    fn test_video_deserializes_camel_case() {
        let json = r#"{
            "videoId": "v1",
            "durationSecs": 9.0,
            "chunks": [
                {"chunkId": "c1", "mediaRef": "s3://v1/c1", "span": {"kind": "time", "startSecs": 0.0, "endSecs": 5.0}}
            ]
        }"#;
        let video: Video = serde_json::from_str(json).unwrap();
        assert_eq!(video.video_id.as_str(), "v1");
        assert_eq!(video.status, VideoStatus::Pending);
        assert_eq!(video.chunks[0].status, ChunkStatus::Pending);
        assert_eq!(video.chunks[0].attempts, 0);
    }
}

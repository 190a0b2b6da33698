//! Chunk models and the chunk status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a chunk, unique within its video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Chunk processing status.
///
/// Legal transitions: `pending -> in-flight -> done | failed`, plus the
/// manual reset `failed -> pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStatus {
    #[default]
    Pending,
    InFlight,
    Done,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::InFlight => "in-flight",
            ChunkStatus::Done => "done",
            ChunkStatus::Failed => "failed",
        }
    }

    /// Check whether moving to `next` is allowed.
    pub fn can_transition_to(&self, next: ChunkStatus) -> bool {
        matches!(
            (self, next),
            (ChunkStatus::Pending, ChunkStatus::InFlight)
                | (ChunkStatus::InFlight, ChunkStatus::Done)
                | (ChunkStatus::InFlight, ChunkStatus::Failed)
                | (ChunkStatus::Failed, ChunkStatus::Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkStatus::Done | ChunkStatus::Failed)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Segment of the source media covered by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkSpan {
    /// Time range in seconds from the start of the video
    #[serde(rename_all = "camelCase")]
    Time { start_secs: f64, end_secs: f64 },
    /// Byte range within the media file
    Bytes { start: u64, end: u64 },
}

impl ChunkSpan {
    pub fn time(start_secs: f64, end_secs: f64) -> Self {
        ChunkSpan::Time { start_secs, end_secs }
    }

    pub fn bytes(start: u64, end: u64) -> Self {
        ChunkSpan::Bytes { start, end }
    }

    /// Offset to add to chunk-relative detection times.
    ///
    /// Byte-range chunks carry no timing information, so the recognizer is
    /// expected to report video-absolute times for them.
    pub fn time_offset_secs(&self) -> f64 {
        match self {
            ChunkSpan::Time { start_secs, .. } => *start_secs,
            ChunkSpan::Bytes { .. } => 0.0,
        }
    }
}

/// A segment of a video submitted to analysis independently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Chunk ID (unique within the video)
    pub chunk_id: ChunkId,

    /// Locator handed to the recognizer
    pub media_ref: String,

    /// Covered segment
    pub span: ChunkSpan,

    #[serde(default)]
    pub status: ChunkStatus,

    /// Recognizer invocations made since the last reset
    #[serde(default)]
    pub attempts: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(chunk_id: impl Into<ChunkId>, media_ref: impl Into<String>, span: ChunkSpan) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            media_ref: media_ref.into(),
            span,
            status: ChunkStatus::Pending,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

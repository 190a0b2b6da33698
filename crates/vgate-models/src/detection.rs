//! Recognizer output models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chunk::ChunkId;
use crate::rect::BoundingBox;
use crate::video::VideoId;

/// Stable identifier of a detection, used to deduplicate re-applied results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DetectionId(pub String);

impl DetectionId {
    /// Derive the fallback ID for the `index`-th detection of a chunk.
    pub fn derived(video_id: &VideoId, chunk_id: &ChunkId, index: usize) -> Self {
        Self(format!("{}/{}/{}", video_id, chunk_id, index))
    }

    /// Namespace a recognizer-assigned ID under its video and chunk.
    pub fn scoped(video_id: &VideoId, chunk_id: &ChunkId, raw: &str) -> Self {
        Self(format!("{}/{}/id:{}", video_id, chunk_id, raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DetectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// External identity reference for a recognized person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PersonId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PersonId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One recognized face in one chunk, in video-absolute time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub detection_id: DetectionId,
    pub video_id: VideoId,
    pub chunk_id: ChunkId,
    pub person_id: PersonId,
    #[serde(default)]
    pub bbox: BoundingBox,
    pub start_secs: f64,
    pub end_secs: f64,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Optional face descriptor vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Detection {
    /// Clamp confidence to [0, 1] and order the time bounds.
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.end_secs < self.start_secs {
            std::mem::swap(&mut self.start_secs, &mut self.end_secs);
        }
        self
    }
}

//! Recognizer request/response types.

use serde::{Deserialize, Serialize};
use vgate_models::{BoundingBox, ChunkId, ChunkSpan, VideoId};

/// Request to analyze one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeRequest {
    pub video_id: VideoId,
    pub chunk_id: ChunkId,
    /// Locator of the chunk media
    pub media_ref: String,
    pub span: ChunkSpan,
}

/// A face detection as reported by the recognizer.
///
/// Times are relative to the start of the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    /// Recognizer-assigned ID, when the service provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
    /// Identity reference of the matched person
    pub person_id: String,
    #[serde(default)]
    pub bbox: BoundingBox,
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl RawDetection {
    pub fn new(person_id: impl Into<String>, start_secs: f64, end_secs: f64, confidence: f64) -> Self {
        Self {
            detection_id: None,
            person_id: person_id.into(),
            bbox: BoundingBox::default(),
            start_secs,
            end_secs,
            confidence,
            embedding: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

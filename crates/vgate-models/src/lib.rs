//! Shared data models for the video analysis gateway.
//!
//! This crate provides Serde-serializable types for:
//! - Videos, chunks and their status state machines
//! - Recognizer detections
//! - Aggregated person appearances

pub mod appearance;
pub mod chunk;
pub mod detection;
pub mod rect;
pub mod video;

// Re-export common types
pub use appearance::{AppearanceInterval, PersonAppearance, VideoAnalysis};
pub use chunk::{Chunk, ChunkId, ChunkSpan, ChunkStatus};
pub use detection::{Detection, DetectionId, PersonId};
pub use rect::BoundingBox;
pub use video::{Video, VideoId, VideoStatus, MAX_ID_LEN};

//! Aggregated person-appearance timelines.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::detection::{DetectionId, PersonId};
use crate::video::VideoId;

/// A span of video time in which a person is visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceInterval {
    pub start_secs: f64,
    pub end_secs: f64,
    /// Max confidence of the detections merged into this interval
    pub confidence: f64,
}

impl AppearanceInterval {
    pub fn new(start_secs: f64, end_secs: f64, confidence: f64) -> Self {
        Self {
            start_secs,
            end_secs,
            confidence,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Deduplicated timeline of one person's presence in a video.
///
/// Intervals are sorted by start and never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonAppearance {
    pub person_id: PersonId,
    pub intervals: Vec<AppearanceInterval>,
    pub max_confidence: f64,
}

impl PersonAppearance {
    pub fn new(person_id: PersonId) -> Self {
        Self {
            person_id,
            intervals: Vec::new(),
            max_confidence: 0.0,
        }
    }

    /// Total on-screen time in seconds.
    pub fn total_secs(&self) -> f64 {
        self.intervals.iter().map(|i| i.duration_secs()).sum()
    }
}

/// Cumulative analysis state of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysis {
    pub video_id: VideoId,
    #[serde(default)]
    pub appearances: BTreeMap<PersonId, PersonAppearance>,
    /// Detections already folded into `appearances`
    #[serde(default)]
    pub applied: BTreeSet<DetectionId>,
}

impl VideoAnalysis {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            appearances: BTreeMap::new(),
            applied: BTreeSet::new(),
        }
    }

    pub fn appearance(&self, person_id: &PersonId) -> Option<&PersonAppearance> {
        self.appearances.get(person_id)
    }
}

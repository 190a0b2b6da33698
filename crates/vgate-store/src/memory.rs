//! In-memory `VideoStore`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use vgate_models::{
    Chunk, ChunkId, ChunkStatus, Detection, Video, VideoAnalysis, VideoId, VideoStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_operation;
use crate::store::{ChunkClaim, VideoStore};

struct VideoRecord {
    video: Video,
    analysis: VideoAnalysis,
    /// Detections recorded with a `done` transition, not yet folded
    unapplied: Vec<Detection>,
}

impl VideoRecord {
    fn new(video: Video) -> Self {
        let analysis = VideoAnalysis::new(video.video_id.clone());
        Self {
            video,
            analysis,
            unapplied: Vec::new(),
        }
    }
}

/// Process-local store guarded by a single `RwLock`.
///
/// Writes hold the lock for the whole read-modify-write, which makes each
/// trait method a transaction.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<VideoId, VideoRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store preloaded with videos.
    pub fn with_videos(videos: impl IntoIterator<Item = Video>) -> Self {
        let records = videos
            .into_iter()
            .map(|mut video| {
                video.refresh_status();
                (video.video_id.clone(), VideoRecord::new(video))
            })
            .collect();

        Self {
            records: RwLock::new(records),
        }
    }

    /// Load a JSON array of videos from disk.
    pub async fn load_seed(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let videos: Vec<Video> = serde_json::from_str(&raw)?;
        info!("Seeded store with {} videos from {}", videos.len(), path.display());
        Ok(Self::with_videos(videos))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn chunk_in<'a>(
    record: &'a mut VideoRecord,
    video_id: &VideoId,
    chunk_id: &ChunkId,
) -> StoreResult<&'a mut Chunk> {
    record
        .video
        .chunk_mut(chunk_id)
        .ok_or_else(|| StoreError::chunk_not_found(video_id, chunk_id))
}

fn record_in<'a>(
    records: &'a mut HashMap<VideoId, VideoRecord>,
    video_id: &VideoId,
) -> StoreResult<&'a mut VideoRecord> {
    records
        .get_mut(video_id)
        .ok_or_else(|| StoreError::VideoNotFound(video_id.clone()))
}

/// Apply a terminal transition to a chunk that must still be in flight.
fn settle(chunk: &mut Chunk, video_id: &VideoId, outcome: ChunkStatus, error: Option<String>) -> bool {
    if chunk.status != ChunkStatus::InFlight {
        debug!(
            video_id = %video_id,
            chunk_id = %chunk.chunk_id,
            status = %chunk.status,
            "Ignoring finish for chunk that is no longer in flight"
        );
        return false;
    }
    chunk.status = outcome;
    chunk.last_error = error;
    chunk.updated_at = Utc::now();
    true
}

#[async_trait]
impl VideoStore for InMemoryStore {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>> {
        let started = Instant::now();
        let video = self
            .records
            .read()
            .await
            .get(video_id)
            .map(|r| r.video.clone());
        record_operation("get_video", true, started);
        Ok(video)
    }

    async fn claim_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<ChunkClaim> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id)
            .and_then(|record| chunk_in(record, video_id, chunk_id))
            .map(|chunk| match chunk.status {
                ChunkStatus::Pending => {
                    chunk.status = ChunkStatus::InFlight;
                    chunk.updated_at = Utc::now();
                    ChunkClaim::Claimed(chunk.clone())
                }
                ChunkStatus::InFlight => ChunkClaim::InFlight,
                settled => ChunkClaim::Settled(settled),
            });
        record_operation("claim_chunk", result.is_ok(), started);
        result
    }

    async fn record_attempt(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<u32> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id)
            .and_then(|record| chunk_in(record, video_id, chunk_id))
            .map(|chunk| {
                chunk.attempts += 1;
                chunk.updated_at = Utc::now();
                chunk.attempts
            });
        record_operation("record_attempt", result.is_ok(), started);
        result
    }

    async fn complete_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        detections: Vec<Detection>,
    ) -> StoreResult<bool> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id).and_then(|record| {
            let completed = settle(chunk_in(record, video_id, chunk_id)?, video_id, ChunkStatus::Done, None);
            if completed {
                record.unapplied.extend(detections);
            }
            Ok(completed)
        });
        record_operation("complete_chunk", result.is_ok(), started);
        result
    }

    async fn finish_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        outcome: ChunkStatus,
        error: Option<String>,
    ) -> StoreResult<bool> {
        let started = Instant::now();
        if !ChunkStatus::InFlight.can_transition_to(outcome) {
            return Err(StoreError::InvalidTransition {
                chunk_id: chunk_id.clone(),
                from: ChunkStatus::InFlight,
                to: outcome,
            });
        }

        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id)
            .and_then(|record| chunk_in(record, video_id, chunk_id))
            .map(|chunk| settle(chunk, video_id, outcome, error));
        record_operation("finish_chunk", result.is_ok(), started);
        result
    }

    async fn reset_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<Chunk> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id)
            .and_then(|record| chunk_in(record, video_id, chunk_id))
            .and_then(|chunk| {
                if !chunk.status.can_transition_to(ChunkStatus::Pending) {
                    return Err(StoreError::InvalidTransition {
                        chunk_id: chunk_id.clone(),
                        from: chunk.status,
                        to: ChunkStatus::Pending,
                    });
                }
                chunk.status = ChunkStatus::Pending;
                chunk.attempts = 0;
                chunk.last_error = None;
                chunk.updated_at = Utc::now();
                Ok(chunk.clone())
            });
        record_operation("reset_chunk", result.is_ok(), started);
        result
    }

    async fn refresh_status(&self, video_id: &VideoId) -> StoreResult<VideoStatus> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, video_id).map(|record| record.video.refresh_status());
        record_operation("refresh_status", result.is_ok(), started);
        result
    }

    async fn load_analysis(&self, video_id: &VideoId) -> StoreResult<VideoAnalysis> {
        let started = Instant::now();
        let result = self
            .records
            .read()
            .await
            .get(video_id)
            .map(|r| r.analysis.clone())
            .ok_or_else(|| StoreError::VideoNotFound(video_id.clone()));
        record_operation("load_analysis", result.is_ok(), started);
        result
    }

    async fn unapplied_detections(&self, video_id: &VideoId) -> StoreResult<Vec<Detection>> {
        let started = Instant::now();
        let result = self
            .records
            .read()
            .await
            .get(video_id)
            .map(|r| r.unapplied.clone())
            .ok_or_else(|| StoreError::VideoNotFound(video_id.clone()));
        record_operation("unapplied_detections", result.is_ok(), started);
        result
    }

    async fn save_analysis(&self, analysis: VideoAnalysis) -> StoreResult<()> {
        let started = Instant::now();
        let mut records = self.records.write().await;
        let result = record_in(&mut records, &analysis.video_id).map(|record| {
            record
                .unapplied
                .retain(|d| !analysis.applied.contains(&d.detection_id));
            record.analysis = analysis;
        });
        record_operation("save_analysis", result.is_ok(), started);
        result
    }
}

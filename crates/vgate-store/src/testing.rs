//! Store wrapper that injects one-shot faults into chosen operations.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use vgate_models::{Chunk, ChunkId, ChunkStatus, Detection, Video, VideoAnalysis, VideoId, VideoStatus};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryStore;
use crate::store::{ChunkClaim, VideoStore};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetVideo,
    ClaimChunk,
    RecordAttempt,
    CompleteChunk,
    FinishChunk,
    ResetChunk,
    RefreshStatus,
    LoadAnalysis,
    UnappliedDetections,
    SaveAnalysis,
}

/// `InMemoryStore` that fails each armed operation exactly once.
pub struct FlakyStore {
    inner: InMemoryStore,
    armed: Mutex<HashSet<StoreOp>>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            armed: Mutex::new(HashSet::new()),
        }
    }

    /// Make the next call of `op` return `StoreError::Unavailable`.
    pub fn fail_once(self, op: StoreOp) -> Self {
        self.armed.lock().unwrap().insert(op);
        self
    }

    fn trip(&self, op: StoreOp) -> StoreResult<()> {
        if self.armed.lock().unwrap().remove(&op) {
            return Err(StoreError::unavailable(format!("injected {:?} fault", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoStore for FlakyStore {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>> {
        self.trip(StoreOp::GetVideo)?;
        self.inner.get_video(video_id).await
    }

    async fn claim_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<ChunkClaim> {
        self.trip(StoreOp::ClaimChunk)?;
        self.inner.claim_chunk(video_id, chunk_id).await
    }

    async fn record_attempt(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<u32> {
        self.trip(StoreOp::RecordAttempt)?;
        self.inner.record_attempt(video_id, chunk_id).await
    }

    async fn complete_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        detections: Vec<Detection>,
    ) -> StoreResult<bool> {
        self.trip(StoreOp::CompleteChunk)?;
        self.inner.complete_chunk(video_id, chunk_id, detections).await
    }

    async fn finish_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        outcome: ChunkStatus,
        error: Option<String>,
    ) -> StoreResult<bool> {
        self.trip(StoreOp::FinishChunk)?;
        self.inner.finish_chunk(video_id, chunk_id, outcome, error).await
    }

    async fn reset_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<Chunk> {
        self.trip(StoreOp::ResetChunk)?;
        self.inner.reset_chunk(video_id, chunk_id).await
    }

    async fn refresh_status(&self, video_id: &VideoId) -> StoreResult<VideoStatus> {
        self.trip(StoreOp::RefreshStatus)?;
        self.inner.refresh_status(video_id).await
    }

    async fn load_analysis(&self, video_id: &VideoId) -> StoreResult<VideoAnalysis> {
        self.trip(StoreOp::LoadAnalysis)?;
        self.inner.load_analysis(video_id).await
    }

    async fn unapplied_detections(&self, video_id: &VideoId) -> StoreResult<Vec<Detection>> {
        self.trip(StoreOp::UnappliedDetections)?;
        self.inner.unapplied_detections(video_id).await
    }

    async fn save_analysis(&self, analysis: VideoAnalysis) -> StoreResult<()> {
        self.trip(StoreOp::SaveAnalysis)?;
        self.inner.save_analysis(analysis).await
    }
}

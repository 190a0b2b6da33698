//! The persistence interface consumed by the analysis core.

use async_trait::async_trait;
use vgate_models::{
    Chunk, ChunkId, ChunkStatus, Detection, Video, VideoAnalysis, VideoId, VideoStatus,
};

use crate::error::StoreResult;

/// Outcome of an attempt to lease a chunk for dispatch.
#[derive(Debug, Clone)]
pub enum ChunkClaim {
    /// The chunk moved `pending -> in-flight`; the caller owns it.
    Claimed(Chunk),
    /// Someone else is already dispatching the chunk.
    InFlight,
    /// The chunk is `done` or `failed` and was left untouched.
    Settled(ChunkStatus),
}

/// Video/chunk/appearance store.
///
/// Every method is atomic with respect to the video it touches.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>>;

    /// Compare-and-set `pending -> in-flight`.
    async fn claim_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<ChunkClaim>;

    /// Increment the attempt counter of an in-flight chunk, returning the new count.
    async fn record_attempt(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<u32>;

    /// Move an in-flight chunk to `done` and record its detections in the
    /// same transaction.
    ///
    /// Recorded detections stay unapplied until a `save_analysis` whose
    /// `applied` set covers them. Returns `false` without changing anything
    /// if the chunk is no longer in flight.
    async fn complete_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        detections: Vec<Detection>,
    ) -> StoreResult<bool>;

    /// Move an in-flight chunk to `done` or `failed`.
    ///
    /// Returns `false` without changing anything if the chunk is no longer
    /// in flight (for example, a watchdog already failed it).
    async fn finish_chunk(
        &self,
        video_id: &VideoId,
        chunk_id: &ChunkId,
        outcome: ChunkStatus,
        error: Option<String>,
    ) -> StoreResult<bool>;

    /// Manual `failed -> pending` reset; clears the attempt counter.
    async fn reset_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> StoreResult<Chunk>;

    /// Recompute the video status from its chunks and persist it.
    async fn refresh_status(&self, video_id: &VideoId) -> StoreResult<VideoStatus>;

    /// Load the cumulative analysis (empty if nothing has been applied yet).
    async fn load_analysis(&self, video_id: &VideoId) -> StoreResult<VideoAnalysis>;

    /// Recorded detections not yet covered by the saved analysis.
    async fn unapplied_detections(&self, video_id: &VideoId) -> StoreResult<Vec<Detection>>;

    /// Replace the analysis, discarding recorded detections it now covers.
    async fn save_analysis(&self, analysis: VideoAnalysis) -> StoreResult<()>;

    /// Connectivity probe.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

//! Request-level orchestration: resolve, dispatch, aggregate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use vgate_models::{Chunk, PersonAppearance, Video, VideoAnalysis, VideoId, VideoStatus};
use vgate_recognizer::Recognizer;
use vgate_store::{StoreError, VideoStore};

use crate::aggregator::Aggregator;
use crate::cancel::{CancelOutcome, CancelRegistry};
use crate::config::AnalysisConfig;
use crate::dispatcher::{ChunkFailure, Dispatcher};
use crate::error::{AnalysisError, AnalysisResult};
use crate::locks::VideoLocks;
use crate::resolver::Resolver;

/// Coarse classification of what a request achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    NothingDone,
    PartiallyDone,
    FullyDone,
}

impl Progress {
    fn from_counts(done: usize, failed: usize) -> Self {
        match (done, failed) {
            (0, _) => Progress::NothingDone,
            (_, 0) => Progress::FullyDone,
            _ => Progress::PartiallyDone,
        }
    }
}

/// Structured result of one `process` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub video_id: VideoId,
    pub video_status: VideoStatus,
    pub chunks_processed: usize,
    pub chunks_failed: usize,
    pub chunks_skipped: usize,
    pub failures: Vec<ChunkFailure>,
    pub new_appearances: Vec<PersonAppearance>,
    pub outcome: Progress,
}

/// Point-in-time view of a video and its timelines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnapshot {
    pub video: Video,
    pub analysis: VideoAnalysis,
}

/// Reachability of the pipeline's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub store: bool,
    pub recognizer: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.store && self.recognizer
    }
}

/// Entry point for video analysis requests.
///
/// Store and recognizer are injected; nothing here holds state across
/// requests besides the per-video locks and cancellation marks.
#[derive(Clone)]
pub struct AnalysisPipeline {
    store: Arc<dyn VideoStore>,
    recognizer: Arc<dyn Recognizer>,
    resolver: Resolver,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    cancels: CancelRegistry,
    locks: VideoLocks,
}

impl AnalysisPipeline {
    pub fn new(store: Arc<dyn VideoStore>, recognizer: Arc<dyn Recognizer>, config: AnalysisConfig) -> Self {
        let locks = VideoLocks::new();
        let cancels = CancelRegistry::new();

        Self {
            resolver: Resolver::new(Arc::clone(&store)),
            dispatcher: Dispatcher::new(
                Arc::clone(&store),
                Arc::clone(&recognizer),
                cancels.clone(),
                config.clone(),
            ),
            aggregator: Aggregator::new(Arc::clone(&store), locks.clone(), config.adjacency_gap_secs),
            store,
            recognizer,
            cancels,
            locks,
        }
    }

    /// Analyze the pending chunks of a video, or one named chunk.
    pub async fn process(&self, video_id: Option<&str>, chunk_id: Option<&str>) -> AnalysisResult<ProcessOutcome> {
        let video_id = video_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AnalysisError::invalid_input("Missing videoId"))?;

        let target = self.resolver.resolve(video_id, chunk_id).await?;
        info!(
            video_id = %target.video_id,
            chunks = target.chunks.len(),
            mode = ?target.mode,
            "Processing video"
        );

        let dispatched = self.dispatcher.dispatch(&target).await?;
        let aggregated = self
            .aggregator
            .aggregate(&target.video_id, &dispatched.detections)
            .await?;

        if dispatched.failed > 0 {
            warn!(
                video_id = %target.video_id,
                failed = dispatched.failed,
                "Some chunks failed analysis"
            );
        }

        Ok(ProcessOutcome {
            outcome: Progress::from_counts(dispatched.done, dispatched.failed),
            video_id: target.video_id,
            video_status: aggregated.video_status,
            chunks_processed: dispatched.done,
            chunks_failed: dispatched.failed,
            chunks_skipped: dispatched.skipped,
            failures: dispatched.failures,
            new_appearances: aggregated.new_appearances,
        })
    }

    /// Cancel a chunk that has not been dispatched yet.
    pub async fn cancel_chunk(&self, video_id: &str, chunk_id: &str) -> AnalysisResult<CancelOutcome> {
        let target = self.resolver.resolve(video_id, Some(chunk_id)).await?;
        let chunk_id = &target.chunks[0].chunk_id;

        let outcome = self
            .cancels
            .cancel(self.store.as_ref(), &target.video_id, chunk_id)
            .await?;
        info!(video_id = %target.video_id, chunk_id = %chunk_id, ?outcome, "Cancel requested");
        Ok(outcome)
    }

    /// Reset a failed chunk to pending so a later request picks it up.
    pub async fn retry_chunk(&self, video_id: &str, chunk_id: &str) -> AnalysisResult<Chunk> {
        let target = self.resolver.resolve(video_id, Some(chunk_id)).await?;
        let video_id = &target.video_id;
        let chunk_id = &target.chunks[0].chunk_id;

        let _guard = self.locks.lock(video_id).await?;
        let chunk = self
            .store
            .reset_chunk(video_id, chunk_id)
            .await
            .map_err(|e| match e {
                StoreError::InvalidTransition { chunk_id, from, .. } => AnalysisError::Conflict(format!(
                    "Chunk {} is {}, only failed chunks can be retried",
                    chunk_id, from
                )),
                other => other.into(),
            })?;
        self.cancels.clear(video_id, chunk_id).await;
        let status = self.store.refresh_status(video_id).await?;

        info!(video_id = %video_id, chunk_id = %chunk_id, status = %status, "Chunk reset for retry");
        Ok(chunk)
    }

    /// Current video record and appearance timelines.
    pub async fn snapshot(&self, video_id: &str) -> AnalysisResult<VideoSnapshot> {
        let target = self.resolver.resolve(video_id, None).await?;
        let video = self
            .store
            .get_video(&target.video_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("Video {} not found", target.video_id)))?;
        let analysis = self.store.load_analysis(&target.video_id).await?;

        Ok(VideoSnapshot { video, analysis })
    }

    /// Probe the store and the recognizer.
    pub async fn readiness(&self) -> Readiness {
        let store = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Store not ready: {}", e);
                false
            }
        };
        let recognizer = match self.recognizer.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Recognizer not ready: {}", e);
                false
            }
        };

        Readiness { store, recognizer }
    }
}

//! Chunk dispatch with bounded concurrency, retries and a per-chunk watchdog.
//!
//! Each chunk is claimed in the store (`pending -> in-flight`) before the
//! recognizer is called, so two overlapping requests never work on the same
//! chunk. The claim is released by exactly one `finish_chunk`: either the
//! dispatch itself or the watchdog, whichever lands first. Results arriving
//! after the watchdog has failed a chunk are discarded.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

use vgate_models::{Chunk, ChunkId, ChunkStatus, Detection, DetectionId, PersonId, VideoId};
use vgate_recognizer::{RawDetection, RecognizeRequest, Recognizer};
use vgate_store::VideoStore;

use crate::cancel::{CancelRegistry, ClaimDecision};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::logging::ChunkLogger;
use crate::metrics::{record_chunk_outcome, record_retry, record_timeout};
use crate::resolver::ResolvedTarget;

/// A chunk that ended in `failed` during this dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub chunk_id: ChunkId,
    pub reason: String,
    pub attempts: u32,
}

/// Why a targeted chunk was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another request holds the chunk
    InFlight,
    /// Already `done` or `failed`
    Settled,
    /// Cancelled before dispatch
    Cancelled,
}

/// Final result for one chunk.
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Done {
        chunk_id: ChunkId,
        detections: Vec<Detection>,
    },
    Failed(ChunkFailure),
    Skipped {
        chunk_id: ChunkId,
        reason: SkipReason,
    },
}

/// Summary of a dispatch over a resolved target.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<ChunkFailure>,
    pub skipped_chunks: Vec<(ChunkId, SkipReason)>,
    /// Normalized detections recorded for every chunk that reached `done`
    pub detections: Vec<Detection>,
}

impl DispatchOutcome {
    fn absorb(&mut self, outcome: ChunkOutcome) {
        match outcome {
            ChunkOutcome::Done { detections, .. } => {
                self.done += 1;
                self.detections.extend(detections);
            }
            ChunkOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
            ChunkOutcome::Skipped { chunk_id, reason } => {
                self.skipped += 1;
                self.skipped_chunks.push((chunk_id, reason));
            }
        }
    }
}

/// Sends claimed chunks to the recognizer.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn VideoStore>,
    recognizer: Arc<dyn Recognizer>,
    cancels: CancelRegistry,
    config: AnalysisConfig,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn VideoStore>,
        recognizer: Arc<dyn Recognizer>,
        cancels: CancelRegistry,
        config: AnalysisConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.dispatch_concurrency.max(1)));
        Self {
            store,
            recognizer,
            cancels,
            config,
            permits,
        }
    }

    /// Dispatch every chunk of a target.
    ///
    /// Chunk failures never abort siblings. A store fault is returned only
    /// after all sibling chunks have finished.
    pub async fn dispatch(&self, target: &ResolvedTarget) -> AnalysisResult<DispatchOutcome> {
        let futures = target
            .chunks
            .iter()
            .map(|chunk| self.dispatch_chunk(&target.video_id, &chunk.chunk_id));
        let results = join_all(futures).await;

        let mut summary = DispatchOutcome::default();
        let mut fault = None;
        for result in results {
            match result {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    error!(video_id = %target.video_id, "Chunk dispatch fault: {}", e);
                    fault.get_or_insert(e);
                }
            }
        }

        match fault {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn dispatch_chunk(&self, video_id: &VideoId, chunk_id: &ChunkId) -> AnalysisResult<ChunkOutcome> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::internal("Dispatch semaphore closed"))?;

        let chunk = match self
            .cancels
            .claim_unless_cancelled(self.store.as_ref(), video_id, chunk_id)
            .await?
        {
            ClaimDecision::Claimed(chunk) => chunk,
            ClaimDecision::Cancelled => return Ok(skipped(chunk_id, SkipReason::Cancelled, "cancelled")),
            ClaimDecision::InFlight => return Ok(skipped(chunk_id, SkipReason::InFlight, "skipped")),
            ClaimDecision::Settled(status) => {
                debug!(video_id = %video_id, chunk_id = %chunk_id, status = %status, "Chunk already settled");
                return Ok(skipped(chunk_id, SkipReason::Settled, "skipped"));
            }
        };

        let logger = ChunkLogger::new(video_id, chunk_id, "dispatch");
        let watchdog = self.spawn_watchdog(video_id, chunk_id);

        let result = self
            .run_attempts(video_id, &chunk, &logger)
            .instrument(logger.create_span())
            .await;

        // On a store fault the chunk may still be in flight; leave the
        // watchdog running so it is released.
        if result.is_ok() {
            watchdog.abort();
        }
        result
    }

    async fn run_attempts(
        &self,
        video_id: &VideoId,
        chunk: &Chunk,
        logger: &ChunkLogger,
    ) -> AnalysisResult<ChunkOutcome> {
        let chunk_id = &chunk.chunk_id;
        let request = RecognizeRequest {
            video_id: video_id.clone(),
            chunk_id: chunk_id.clone(),
            media_ref: chunk.media_ref.clone(),
            span: chunk.span.clone(),
        };
        let policy = &self.config.backoff;
        logger.log_start(&chunk.media_ref);

        loop {
            let attempts = self.store.record_attempt(video_id, chunk_id).await?;

            match self.recognizer.recognize(&request).await {
                Ok(raw) => {
                    let detections = to_detections(video_id, chunk, raw);
                    if !self
                        .store
                        .complete_chunk(video_id, chunk_id, detections.clone())
                        .await?
                    {
                        return Ok(self.timed_out(chunk_id, attempts, logger));
                    }

                    logger.log_completion(detections.len());
                    record_chunk_outcome("done");
                    return Ok(ChunkOutcome::Done {
                        chunk_id: chunk_id.clone(),
                        detections,
                    });
                }
                Err(e) if e.is_transient() && policy.should_retry(attempts) => {
                    let delay = policy.delay_for(attempts, e.retry_after_ms().map(Duration::from_millis));
                    logger.log_retry(attempts, delay.as_millis() as u64, &e.to_string());
                    record_retry();
                    tokio::time::sleep(delay).await;

                    if !self.still_in_flight(video_id, chunk_id).await? {
                        return Ok(self.timed_out(chunk_id, attempts, logger));
                    }
                }
                Err(e) => {
                    let reason = if e.is_transient() {
                        format!("Retries exhausted after {} attempts: {}", attempts, e)
                    } else {
                        format!("Recognizer rejected chunk: {}", e)
                    };

                    if !self
                        .store
                        .finish_chunk(video_id, chunk_id, ChunkStatus::Failed, Some(reason.clone()))
                        .await?
                    {
                        return Ok(self.timed_out(chunk_id, attempts, logger));
                    }

                    logger.log_failure(attempts, &reason);
                    record_chunk_outcome("failed");
                    return Ok(ChunkOutcome::Failed(ChunkFailure {
                        chunk_id: chunk_id.clone(),
                        reason,
                        attempts,
                    }));
                }
            }
        }
    }

    async fn still_in_flight(&self, video_id: &VideoId, chunk_id: &ChunkId) -> AnalysisResult<bool> {
        let video = self
            .store
            .get_video(video_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("Video {} not found", video_id)))?;
        Ok(video
            .chunk(chunk_id)
            .is_some_and(|c| c.status == ChunkStatus::InFlight))
    }

    /// The watchdog already failed this chunk; report it without touching the store.
    fn timed_out(&self, chunk_id: &ChunkId, attempts: u32, logger: &ChunkLogger) -> ChunkOutcome {
        let reason = timeout_reason(self.config.chunk_timeout);
        logger.log_failure(attempts, &reason);
        record_chunk_outcome("failed");
        ChunkOutcome::Failed(ChunkFailure {
            chunk_id: chunk_id.clone(),
            reason,
            attempts,
        })
    }

    fn spawn_watchdog(&self, video_id: &VideoId, chunk_id: &ChunkId) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let timeout = self.config.chunk_timeout;
        let video_id = video_id.clone();
        let chunk_id = chunk_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match store
                .finish_chunk(&video_id, &chunk_id, ChunkStatus::Failed, Some(timeout_reason(timeout)))
                .await
            {
                Ok(true) => {
                    warn!(video_id = %video_id, chunk_id = %chunk_id, "Chunk exceeded its time budget");
                    record_timeout();
                }
                Ok(false) => {}
                Err(e) => {
                    error!(video_id = %video_id, chunk_id = %chunk_id, "Watchdog could not fail chunk: {}", e);
                }
            }
        })
    }
}

fn timeout_reason(timeout: Duration) -> String {
    format!("Timed out after {}ms", timeout.as_millis())
}

fn skipped(chunk_id: &ChunkId, reason: SkipReason, metric: &'static str) -> ChunkOutcome {
    record_chunk_outcome(metric);
    ChunkOutcome::Skipped {
        chunk_id: chunk_id.clone(),
        reason,
    }
}

/// Convert recognizer output into video-relative, normalized detections.
///
/// Sightings without a person or with non-finite times are dropped. The
/// index used for derived IDs is the position in the raw reply, so it is
/// stable regardless of what gets dropped.
fn to_detections(video_id: &VideoId, chunk: &Chunk, raw: Vec<RawDetection>) -> Vec<Detection> {
    let offset = chunk.span.time_offset_secs();

    raw.into_iter()
        .enumerate()
        .filter(|(index, r)| {
            let usable = r.start_secs.is_finite() && r.end_secs.is_finite();
            if !usable {
                warn!(chunk_id = %chunk.chunk_id, index, "Dropping detection with non-finite times");
            }
            usable && !r.person_id.trim().is_empty()
        })
        .map(|(index, r)| {
            let detection_id = match r.detection_id.as_deref() {
                Some(id) if !id.is_empty() => DetectionId::scoped(video_id, &chunk.chunk_id, id),
                _ => DetectionId::derived(video_id, &chunk.chunk_id, index),
            };
            Detection {
                detection_id,
                video_id: video_id.clone(),
                chunk_id: chunk.chunk_id.clone(),
                person_id: PersonId::from(r.person_id.trim()),
                bbox: r.bbox,
                start_secs: offset + r.start_secs,
                end_secs: offset + r.end_secs,
                confidence: r.confidence,
                embedding: r.embedding,
            }
            .normalized()
        })
        .collect()
}

//! Pre-dispatch cancellation of individual chunks.
//!
//! A cancellation only takes effect while the chunk is still `pending`. The
//! registry mutex serializes "check status and mark" against "take mark or
//! claim", so a cancellation either lands before the claim or reports that
//! the chunk was already taken.
//!
//! Marks for chunks that are never dispatched again expire after a TTL, and
//! the oldest are evicted once the registry reaches capacity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;
use vgate_models::{ChunkId, ChunkStatus, VideoId};
use vgate_store::{ChunkClaim, StoreError, VideoStore};

use crate::error::AnalysisResult;

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The chunk will be skipped by the next dispatch that reaches it.
    Cancelled,
    /// The chunk was not pending; nothing changed.
    NotPending(ChunkStatus),
}

/// What the dispatcher should do with a chunk.
#[derive(Debug, Clone)]
pub enum ClaimDecision {
    Claimed(vgate_models::Chunk),
    Cancelled,
    InFlight,
    Settled(ChunkStatus),
}

/// Maximum number of outstanding cancellation marks.
const MAX_MARKS: usize = 10_000;

/// How long an unconsumed mark is honoured.
const MARK_TTL: Duration = Duration::from_secs(24 * 3600);

type MarkKey = (VideoId, ChunkId);

#[derive(Clone)]
pub struct CancelRegistry {
    marks: Arc<Mutex<HashMap<MarkKey, Instant>>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for CancelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::with_limits(MAX_MARKS, MARK_TTL)
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            marks: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Drop expired marks, then the oldest ones until there is room for one more.
    fn make_room(&self, marks: &mut HashMap<MarkKey, Instant>) {
        let now = Instant::now();
        marks.retain(|_, marked_at| now.duration_since(*marked_at) < self.ttl);

        if marks.len() >= self.capacity {
            let mut entries: Vec<_> = marks.iter().map(|(k, t)| (k.clone(), *t)).collect();
            entries.sort_by_key(|(_, t)| *t);

            let to_remove = marks.len() + 1 - self.capacity;
            for (key, _) in entries.into_iter().take(to_remove) {
                marks.remove(&key);
            }
            warn!("Cancellation registry at capacity, evicted {} marks", to_remove);
        }
    }

    /// Mark a pending chunk as cancelled.
    pub async fn cancel(
        &self,
        store: &dyn VideoStore,
        video_id: &VideoId,
        chunk_id: &ChunkId,
    ) -> AnalysisResult<CancelOutcome> {
        let mut marks = self.marks.lock().await;

        let video = store
            .get_video(video_id)
            .await?
            .ok_or_else(|| StoreError::VideoNotFound(video_id.clone()))?;
        let chunk = video
            .chunk(chunk_id)
            .ok_or_else(|| StoreError::chunk_not_found(video_id, chunk_id))?;

        if chunk.status != ChunkStatus::Pending {
            return Ok(CancelOutcome::NotPending(chunk.status));
        }

        let key = (video_id.clone(), chunk_id.clone());
        if !marks.contains_key(&key) {
            self.make_room(&mut marks);
        }
        marks.insert(key, Instant::now());
        Ok(CancelOutcome::Cancelled)
    }

    /// Consume a cancellation mark, or claim the chunk in the store.
    pub async fn claim_unless_cancelled(
        &self,
        store: &dyn VideoStore,
        video_id: &VideoId,
        chunk_id: &ChunkId,
    ) -> AnalysisResult<ClaimDecision> {
        let mut marks = self.marks.lock().await;

        if let Some(marked_at) = marks.remove(&(video_id.clone(), chunk_id.clone())) {
            if marked_at.elapsed() < self.ttl {
                return Ok(ClaimDecision::Cancelled);
            }
        }

        Ok(match store.claim_chunk(video_id, chunk_id).await? {
            ChunkClaim::Claimed(chunk) => ClaimDecision::Claimed(chunk),
            ChunkClaim::InFlight => ClaimDecision::InFlight,
            ChunkClaim::Settled(status) => ClaimDecision::Settled(status),
        })
    }

    /// Drop any mark for a chunk (used when a chunk is reset).
    pub async fn clear(&self, video_id: &VideoId, chunk_id: &ChunkId) {
        self.marks
            .lock()
            .await
            .remove(&(video_id.clone(), chunk_id.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgate_models::{Chunk, ChunkSpan, Video};
    use vgate_store::InMemoryStore;

    fn store() -> InMemoryStore {
        InMemoryStore::with_videos([Video::new("v1", 10.0)
            .with_chunk(Chunk::new("c1", "s3://v1/c1", ChunkSpan::time(0.0, 5.0)))])
    }

    #[tokio::test]
    async fn test_cancel_pending_then_skip_once() {
        let store = store();
        let registry = CancelRegistry::new();
        let (v1, c1) = (VideoId::from("v1"), ChunkId::from("c1"));

        assert_eq!(
            registry.cancel(&store, &v1, &c1).await.unwrap(),
            CancelOutcome::Cancelled
        );
        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &c1).await.unwrap(),
            ClaimDecision::Cancelled
        ));
        // The mark is consumed; the next dispatch claims normally.
        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &c1).await.unwrap(),
            ClaimDecision::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_cancel_in_flight_has_no_effect() {
        let store = store();
        let registry = CancelRegistry::new();
        let (v1, c1) = (VideoId::from("v1"), ChunkId::from("c1"));

        registry.claim_unless_cancelled(&store, &v1, &c1).await.unwrap();
        assert_eq!(
            registry.cancel(&store, &v1, &c1).await.unwrap(),
            CancelOutcome::NotPending(ChunkStatus::InFlight)
        );
        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &c1).await.unwrap(),
            ClaimDecision::InFlight
        ));
    }

    #[tokio::test]
    async fn test_marks_are_bounded() {
        let store = InMemoryStore::with_videos([Video::new("v1", 15.0)
            .with_chunk(Chunk::new("c1", "s3://v1/c1", ChunkSpan::time(0.0, 5.0)))
            .with_chunk(Chunk::new("c2", "s3://v1/c2", ChunkSpan::time(5.0, 10.0)))
            .with_chunk(Chunk::new("c3", "s3://v1/c3", ChunkSpan::time(10.0, 15.0)))]);
        let registry = CancelRegistry::with_limits(2, Duration::from_secs(3600));
        let v1 = VideoId::from("v1");

        for id in ["c1", "c2", "c3"] {
            registry.cancel(&store, &v1, &id.into()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(registry.marks.lock().await.len(), 2);

        // The oldest mark was evicted.
        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &"c1".into()).await.unwrap(),
            ClaimDecision::Claimed(_)
        ));
        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &"c3".into()).await.unwrap(),
            ClaimDecision::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_expired_mark_is_ignored() {
        let store = store();
        let registry = CancelRegistry::with_limits(10, Duration::from_millis(10));
        let (v1, c1) = (VideoId::from("v1"), ChunkId::from("c1"));

        registry.cancel(&store, &v1, &c1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            registry.claim_unless_cancelled(&store, &v1, &c1).await.unwrap(),
            ClaimDecision::Claimed(_)
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_chunk() {
        let store = store();
        let registry = CancelRegistry::new();
        let err = registry
            .cancel(&store, &"v1".into(), &"c9".into())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AnalysisError::InvalidReference(_)));
    }
}

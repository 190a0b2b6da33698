//! Per-video mutual exclusion.
//!
//! Dispatch runs chunks in parallel, but folding results into a video's
//! cumulative state must be serialized per video. Each video gets its own
//! async mutex, created on first use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use vgate_models::VideoId;

use crate::error::{AnalysisError, AnalysisResult};

/// Prune idle entries once the map grows past this many videos.
const PRUNE_THRESHOLD: usize = 1_024;

/// Default wait before giving up on a video lock.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Lazily created mutex per video.
#[derive(Clone)]
pub struct VideoLocks {
    locks: Arc<Mutex<HashMap<VideoId, Arc<Mutex<()>>>>>,
    timeout: Duration,
}

impl Default for VideoLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoLocks {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Acquire the lock for a video, waiting at most the configured timeout.
    pub async fn lock(&self, video_id: &VideoId) -> AnalysisResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the map holds a reference to idle entries.
                locks.retain(|_, l| Arc::strong_count(l) > 1);
                debug!("Pruned video locks, {} remain", locks.len());
            }
            Arc::clone(locks.entry(video_id.clone()).or_default())
        };

        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                AnalysisError::internal(format!("Timed out waiting for lock on video {}", video_id))
            })
    }

    /// Number of videos with a lock entry.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_video_is_exclusive() {
        let locks = VideoLocks::new().with_timeout(Duration::from_millis(50));
        let v1 = VideoId::from("v1");

        let guard = locks.lock(&v1).await.unwrap();
        let err = locks.lock(&v1).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InternalFault(_)));

        drop(guard);
        assert!(locks.lock(&v1).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_videos_do_not_block() {
        let locks = VideoLocks::new().with_timeout(Duration::from_millis(50));

        let _g1 = locks.lock(&"v1".into()).await.unwrap();
        let _g2 = locks.lock(&"v2".into()).await.unwrap();
        assert_eq!(locks.len().await, 2);
    }
}

//! Folding detections into per-person appearance timelines.
//!
//! `fold` is pure: the same detection set applied twice yields the same
//! state as applying it once, and the result does not depend on the order in
//! which chunks completed. `Aggregator` wraps it in the per-video lock and
//! persists the result.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vgate_models::{
    AppearanceInterval, Detection, PersonAppearance, PersonId, VideoAnalysis, VideoId, VideoStatus,
};
use vgate_store::VideoStore;

use crate::error::AnalysisResult;
use crate::locks::VideoLocks;

/// Result of folding a detection batch into a video's state.
#[derive(Debug, Clone)]
pub struct Folded {
    pub analysis: VideoAnalysis,
    /// Persons whose timeline changed
    pub touched: BTreeSet<PersonId>,
    /// Detections applied for the first time
    pub applied: usize,
    /// Detections skipped because they were already applied
    pub duplicates: usize,
}

/// Outcome of `Aggregator::aggregate`.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub video_status: VideoStatus,
    /// Current timelines of every person touched by the fold or reported by the caller
    pub new_appearances: Vec<PersonAppearance>,
    pub applied: usize,
    pub duplicates: usize,
}

/// Fold new detections into `state`.
///
/// Detections are deduplicated by `DetectionId` against everything applied
/// before. Two intervals of the same person merge when they overlap or the
/// gap between them is at most `gap_secs`; the merged confidence is the max.
pub fn fold(mut state: VideoAnalysis, detections: &[Detection], gap_secs: f64) -> Folded {
    let mut grouped: BTreeMap<PersonId, Vec<AppearanceInterval>> = BTreeMap::new();
    let mut applied = 0;
    let mut duplicates = 0;

    for detection in detections {
        if detection.video_id != state.video_id {
            warn!(
                video_id = %state.video_id,
                detection_video_id = %detection.video_id,
                "Ignoring detection for another video"
            );
            continue;
        }
        if !state.applied.insert(detection.detection_id.clone()) {
            duplicates += 1;
            continue;
        }

        applied += 1;
        grouped
            .entry(detection.person_id.clone())
            .or_default()
            .push(AppearanceInterval::new(
                detection.start_secs,
                detection.end_secs,
                detection.confidence,
            ));
    }

    let touched: BTreeSet<PersonId> = grouped.keys().cloned().collect();

    for (person_id, fresh) in grouped {
        let appearance = state
            .appearances
            .entry(person_id.clone())
            .or_insert_with(|| PersonAppearance::new(person_id));

        let mut intervals = std::mem::take(&mut appearance.intervals);
        intervals.extend(fresh);
        appearance.intervals = merge_intervals(intervals, gap_secs);
        appearance.max_confidence = appearance
            .intervals
            .iter()
            .map(|i| i.confidence)
            .fold(0.0, f64::max);
    }

    Folded {
        analysis: state,
        touched,
        applied,
        duplicates,
    }
}

/// Sort by start and sweep, merging neighbours within `gap_secs`.
pub fn merge_intervals(mut intervals: Vec<AppearanceInterval>, gap_secs: f64) -> Vec<AppearanceInterval> {
    intervals.sort_by(|a, b| {
        a.start_secs
            .total_cmp(&b.start_secs)
            .then(a.end_secs.total_cmp(&b.end_secs))
    });

    let mut merged: Vec<AppearanceInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start_secs - last.end_secs <= gap_secs => {
                last.end_secs = last.end_secs.max(interval.end_secs);
                last.confidence = last.confidence.max(interval.confidence);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Applies recorded detections to stored video state, one video at a time.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn VideoStore>,
    locks: VideoLocks,
    gap_secs: f64,
}

impl Aggregator {
    pub fn new(store: Arc<dyn VideoStore>, locks: VideoLocks, gap_secs: f64) -> Self {
        Self {
            store,
            locks,
            gap_secs,
        }
    }

    /// Fold every recorded but unapplied detection of a video into its
    /// timelines and recompute its status.
    ///
    /// `reported` are the detections the caller's own dispatch recorded;
    /// their persons are included in `new_appearances` even when a
    /// concurrent request folded them first. Unapplied detections left by an
    /// earlier failed request are picked up here too.
    pub async fn aggregate(
        &self,
        video_id: &VideoId,
        reported: &[Detection],
    ) -> AnalysisResult<AggregationOutcome> {
        let _guard = self.locks.lock(video_id).await?;

        let state = self.store.load_analysis(video_id).await?;
        let pending = self.store.unapplied_detections(video_id).await?;
        let folded = fold(state, &pending, self.gap_secs);

        if !pending.is_empty() {
            self.store.save_analysis(folded.analysis.clone()).await?;
        }
        let video_status = self.store.refresh_status(video_id).await?;

        if folded.duplicates > 0 {
            debug!(video_id = %video_id, duplicates = folded.duplicates, "Skipped already-applied detections");
        }
        info!(
            video_id = %video_id,
            applied = folded.applied,
            persons = folded.touched.len(),
            status = %video_status,
            "Aggregated detections"
        );

        let mut persons = folded.touched;
        persons.extend(reported.iter().map(|d| d.person_id.clone()));
        let new_appearances = persons
            .iter()
            .filter_map(|p| folded.analysis.appearance(p).cloned())
            .collect();

        Ok(AggregationOutcome {
            video_status,
            new_appearances,
            applied: folded.applied,
            duplicates: folded.duplicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgate_models::{BoundingBox, Chunk, ChunkId, ChunkSpan, ChunkStatus, DetectionId, Video};
    use vgate_store::testing::{FlakyStore, StoreOp};
    use vgate_store::InMemoryStore;

    fn detection(id: &str, person: &str, start: f64, end: f64, confidence: f64) -> Detection {
        Detection {
            detection_id: DetectionId::from(id),
            video_id: "v1".into(),
            chunk_id: "c1".into(),
            person_id: person.into(),
            bbox: BoundingBox::default(),
            start_secs: start,
            end_secs: end,
            confidence,
            embedding: None,
        }
    }

    fn spans(analysis: &VideoAnalysis, person: &str) -> Vec<(f64, f64)> {
        analysis
            .appearance(&person.into())
            .map(|a| a.intervals.iter().map(|i| (i.start_secs, i.end_secs)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_adjacent_chunks_merge_into_one_interval() {
        let batch = [
            detection("d1", "p1", 0.0, 5.0, 0.7),
            detection("d2", "p1", 5.0, 9.0, 0.9),
        ];
        let folded = fold(VideoAnalysis::new("v1".into()), &batch, 2.0);

        assert_eq!(spans(&folded.analysis, "p1"), vec![(0.0, 9.0)]);
        let appearance = folded.analysis.appearance(&"p1".into()).unwrap();
        assert_eq!(appearance.intervals[0].confidence, 0.9);
        assert_eq!(appearance.max_confidence, 0.9);
    }

    #[test]
    fn test_gap_threshold_is_inclusive() {
        let within = [
            detection("d1", "p1", 0.0, 5.0, 0.5),
            detection("d2", "p1", 7.0, 9.0, 0.5),
        ];
        let folded = fold(VideoAnalysis::new("v1".into()), &within, 2.0);
        assert_eq!(spans(&folded.analysis, "p1"), vec![(0.0, 9.0)]);

        let beyond = [
            detection("d1", "p1", 0.0, 5.0, 0.5),
            detection("d2", "p1", 7.5, 9.0, 0.5),
        ];
        let folded = fold(VideoAnalysis::new("v1".into()), &beyond, 2.0);
        assert_eq!(spans(&folded.analysis, "p1"), vec![(0.0, 5.0), (7.5, 9.0)]);
    }

    #[test]
    fn test_overlapping_detections_never_overlap_after_merge() {
        let batch = [
            detection("d1", "p1", 0.0, 4.0, 0.5),
            detection("d2", "p1", 3.0, 6.0, 0.6),
            detection("d3", "p1", 2.0, 3.0, 0.4),
            detection("d4", "p1", 20.0, 21.0, 0.8),
        ];
        let folded = fold(VideoAnalysis::new("v1".into()), &batch, 0.0);
        assert_eq!(spans(&folded.analysis, "p1"), vec![(0.0, 6.0), (20.0, 21.0)]);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let batch = [
            detection("d1", "p1", 0.0, 5.0, 0.7),
            detection("d2", "p2", 30.0, 31.0, 0.6),
        ];
        let once = fold(VideoAnalysis::new("v1".into()), &batch, 2.0);
        let twice = fold(once.analysis.clone(), &batch, 2.0);

        assert_eq!(once.analysis, twice.analysis);
        assert_eq!(twice.applied, 0);
        assert_eq!(twice.duplicates, 2);
        assert!(twice.touched.is_empty());
    }

    #[test]
    fn test_fold_is_order_independent() {
        let c1 = [detection("d1", "p1", 0.0, 5.0, 0.7)];
        let c2 = [detection("d2", "p1", 6.0, 9.0, 0.9)];
        let c3 = [detection("d3", "p1", 15.0, 16.0, 0.3)];

        let forward = [&c1[..], &c2[..], &c3[..]]
            .iter()
            .fold(VideoAnalysis::new("v1".into()), |s, b| fold(s, b, 2.0).analysis);
        let backward = [&c3[..], &c2[..], &c1[..]]
            .iter()
            .fold(VideoAnalysis::new("v1".into()), |s, b| fold(s, b, 2.0).analysis);

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_persons_are_kept_apart() {
        let batch = [
            detection("d1", "p1", 0.0, 5.0, 0.7),
            detection("d2", "p2", 1.0, 2.0, 0.6),
        ];
        let folded = fold(VideoAnalysis::new("v1".into()), &batch, 2.0);
        assert_eq!(folded.analysis.appearances.len(), 2);
        assert_eq!(folded.touched.len(), 2);
    }

    #[test]
    fn test_foreign_video_detections_ignored() {
        let mut foreign = detection("d1", "p1", 0.0, 1.0, 0.9);
        foreign.video_id = "v2".into();
        let folded = fold(VideoAnalysis::new("v1".into()), &[foreign], 2.0);
        assert!(folded.analysis.appearances.is_empty());
        assert_eq!(folded.applied, 0);
    }

    #[tokio::test]
    async fn test_aggregate_folds_recorded_detections() {
        let video = Video::new("v1", 10.0)
            .with_chunk(Chunk::new("c1", "s3://v1/c1", ChunkSpan::time(0.0, 5.0)))
            .with_chunk(Chunk::new("c2", "s3://v1/c2", ChunkSpan::time(5.0, 10.0)));
        let store = Arc::new(InMemoryStore::with_videos([video]));
        let (v1, c1, c2) = (VideoId::from("v1"), ChunkId::from("c1"), ChunkId::from("c2"));

        let batch = vec![detection("d1", "p1", 0.0, 5.0, 0.8)];
        store.claim_chunk(&v1, &c1).await.unwrap();
        store.complete_chunk(&v1, &c1, batch.clone()).await.unwrap();
        store.claim_chunk(&v1, &c2).await.unwrap();
        store
            .finish_chunk(&v1, &c2, ChunkStatus::Failed, Some("boom".into()))
            .await
            .unwrap();

        let aggregator = Aggregator::new(store.clone(), VideoLocks::new(), 2.0);
        let outcome = aggregator.aggregate(&v1, &batch).await.unwrap();

        assert_eq!(outcome.video_status, VideoStatus::Partial);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.new_appearances.len(), 1);

        let stored = store.load_analysis(&v1).await.unwrap();
        assert_eq!(spans(&stored, "p1"), vec![(0.0, 5.0)]);
        assert!(store.unapplied_detections(&v1).await.unwrap().is_empty());

        let again = aggregator.aggregate(&v1, &[]).await.unwrap();
        assert_eq!(again.applied, 0);
        assert!(again.new_appearances.is_empty());
        assert_eq!(store.load_analysis(&v1).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_detections_for_next_fold() {
        let video =
            Video::new("v1", 5.0).with_chunk(Chunk::new("c1", "s3://v1/c1", ChunkSpan::time(0.0, 5.0)));
        let store = Arc::new(
            FlakyStore::new(InMemoryStore::with_videos([video])).fail_once(StoreOp::SaveAnalysis),
        );
        let (v1, c1) = (VideoId::from("v1"), ChunkId::from("c1"));

        store.claim_chunk(&v1, &c1).await.unwrap();
        store
            .complete_chunk(&v1, &c1, vec![detection("d1", "p1", 0.0, 5.0, 0.8)])
            .await
            .unwrap();

        let aggregator = Aggregator::new(store.clone(), VideoLocks::new(), 2.0);
        assert!(aggregator.aggregate(&v1, &[]).await.is_err());
        assert!(store.load_analysis(&v1).await.unwrap().appearances.is_empty());

        let outcome = aggregator.aggregate(&v1, &[]).await.unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.video_status, VideoStatus::Complete);
        assert_eq!(spans(&store.load_analysis(&v1).await.unwrap(), "p1"), vec![(0.0, 5.0)]);
    }
}

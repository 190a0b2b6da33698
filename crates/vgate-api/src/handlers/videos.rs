//! Video status handler.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vgate_models::{Chunk, PersonAppearance, VideoId, VideoStatus};

use crate::error::ApiResult;
use crate::state::AppState;

/// Video status with its chunks and appearance timelines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub chunks: Vec<Chunk>,
    pub appearances: Vec<PersonAppearance>,
}

/// Get a video's current state.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let snapshot = state.pipeline.snapshot(&video_id).await?;

    Ok(Json(VideoResponse {
        video_id: snapshot.video.video_id,
        status: snapshot.video.status,
        chunks: snapshot.video.chunks,
        appearances: snapshot.analysis.appearances.into_values().collect(),
    }))
}

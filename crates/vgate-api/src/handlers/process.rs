//! Video processing handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use vgate_analysis::ProcessOutcome;

use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /processVideo`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoRequest {
    #[serde(default)]
    pub video_id: Option<String>,
    /// Restrict the request to one chunk
    #[serde(default)]
    pub chunk_id: Option<String>,
}

/// Analyze a video's pending chunks, or a single chunk.
///
/// Per-chunk failures are part of the 200 payload; only invalid input and
/// infrastructure faults produce error statuses.
pub async fn process_video(
    State(state): State<AppState>,
    payload: Result<Json<ProcessVideoRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessOutcome>> {
    let Json(request) = payload?;

    let outcome = state
        .pipeline
        .process(request.video_id.as_deref(), request.chunk_id.as_deref())
        .await?;

    Ok(Json(outcome))
}

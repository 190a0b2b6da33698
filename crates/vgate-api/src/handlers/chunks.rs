//! Chunk control handlers: cancellation and manual retry.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use vgate_analysis::CancelOutcome;
use vgate_models::{Chunk, ChunkStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of the chunk control endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

impl ChunkRequest {
    /// Both IDs, or the reason one is missing.
    fn ids(&self) -> ApiResult<(&str, &str)> {
        let video_id = present(&self.video_id).ok_or_else(|| ApiError::bad_request("Missing videoId"))?;
        let chunk_id = present(&self.chunk_id).ok_or_else(|| ApiError::bad_request("Missing chunkId"))?;
        Ok((video_id, chunk_id))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    /// Current status when the chunk could no longer be cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ChunkStatus>,
}

/// Cancel a chunk before it is dispatched.
pub async fn cancel_chunk(
    State(state): State<AppState>,
    payload: Result<Json<ChunkRequest>, JsonRejection>,
) -> ApiResult<Json<CancelResponse>> {
    let Json(request) = payload?;
    let (video_id, chunk_id) = request.ids()?;

    let response = match state.pipeline.cancel_chunk(video_id, chunk_id).await? {
        CancelOutcome::Cancelled => CancelResponse {
            cancelled: true,
            status: None,
        },
        CancelOutcome::NotPending(status) => CancelResponse {
            cancelled: false,
            status: Some(status),
        },
    };

    Ok(Json(response))
}

/// Reset a failed chunk to pending.
pub async fn retry_chunk(
    State(state): State<AppState>,
    payload: Result<Json<ChunkRequest>, JsonRejection>,
) -> ApiResult<Json<Chunk>> {
    let Json(request) = payload?;
    let (video_id, chunk_id) = request.ids()?;

    let chunk = state.pipeline.retry_chunk(video_id, chunk_id).await?;
    Ok(Json(chunk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_require_both_fields() {
        let request = ChunkRequest {
            video_id: Some("v1".into()),
            chunk_id: None,
        };
        assert_eq!(request.ids().unwrap_err().to_string(), "Missing chunkId");

        let request = ChunkRequest {
            video_id: Some(" ".into()),
            chunk_id: Some("c1".into()),
        };
        assert_eq!(request.ids().unwrap_err().to_string(), "Missing videoId");

        let request = ChunkRequest {
            video_id: Some("v1".into()),
            chunk_id: Some("c1".into()),
        };
        assert_eq!(request.ids().unwrap(), ("v1", "c1"));
    }
}

//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub store: CheckStatus,
    pub recognizer: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
}

impl CheckStatus {
    fn from_ok(ok: bool) -> Self {
        Self {
            status: if ok { "ok" } else { "error" }.to_string(),
        }
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks the store and the recognizer service.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let readiness = state.pipeline.readiness().await;

    let response = ReadinessResponse {
        status: if readiness.is_ready() { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            store: CheckStatus::from_ok(readiness.store),
            recognizer: CheckStatus::from_ok(readiness.recognizer),
        },
    };

    if readiness.is_ready() {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

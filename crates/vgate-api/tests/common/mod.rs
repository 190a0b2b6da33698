#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use vgate_analysis::{AnalysisConfig, BackoffPolicy};
use vgate_api::{create_router, ApiConfig, AppState};
use vgate_models::{Chunk, ChunkSpan, Video};
use vgate_recognizer::testing::ScriptedRecognizer;
use vgate_store::{InMemoryStore, VideoStore};

/// Video `v1` with chunks `c1` = [0s, 5s) and `c2` = [5s, 10s), both pending.
pub fn two_chunk_video() -> Video {
    Video::new("v1", 10.0)
        .with_chunk(Chunk::new("c1", "s3://videos/v1/c1.mp4", ChunkSpan::time(0.0, 5.0)))
        .with_chunk(Chunk::new("c2", "s3://videos/v1/c2.mp4", ChunkSpan::time(5.0, 10.0)))
}

/// Build the full router around an in-memory store and a scripted recognizer.
pub fn build_test_app(videos: Vec<Video>, recognizer: ScriptedRecognizer) -> (Router, Arc<ScriptedRecognizer>) {
    build_app_with_store(Arc::new(InMemoryStore::with_videos(videos)), recognizer)
}

/// Build the full router around any store.
///
/// Backoff delays are shortened so retry paths run in milliseconds.
pub fn build_app_with_store(
    store: Arc<dyn VideoStore>,
    recognizer: ScriptedRecognizer,
) -> (Router, Arc<ScriptedRecognizer>) {
    let recognizer = Arc::new(recognizer);
    let analysis = AnalysisConfig::default().with_backoff(
        BackoffPolicy::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .without_jitter(),
    );

    let state = AppState::new(ApiConfig::default(), store, recognizer.clone(), analysis);
    (create_router(state, None), recognizer)
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

//! Integration tests for `POST /processVideo`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use std::sync::Arc;

use common::{body_json, build_app_with_store, build_test_app, get, post_json, two_chunk_video};
use serde_json::json;
use tower::ServiceExt;

use vgate_recognizer::testing::{Scripted, ScriptedRecognizer};
use vgate_recognizer::RawDetection;
use vgate_store::testing::{FlakyStore, StoreOp};
use vgate_store::InMemoryStore;

fn p1_in_both_chunks() -> ScriptedRecognizer {
    ScriptedRecognizer::new()
        .push("c1", Scripted::Detections(vec![RawDetection::new("p1", 0.0, 5.0, 0.82)]))
        .push("c2", Scripted::Detections(vec![RawDetection::new("p1", 0.0, 4.0, 0.91)]))
}

#[tokio::test]
async fn adjacent_chunks_merge_and_video_completes() {
    let (app, _) = build_test_app(vec![two_chunk_video()], p1_in_both_chunks());

    let response = post_json(app, "/processVideo", json!({ "videoId": "v1" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["videoStatus"], "complete");
    assert_eq!(json["chunksProcessed"], 2);
    assert_eq!(json["chunksFailed"], 0);
    assert_eq!(json["outcome"], "fully_done");

    let appearances = json["newAppearances"].as_array().unwrap();
    assert_eq!(appearances.len(), 1);
    assert_eq!(appearances[0]["personId"], "p1");
    assert_eq!(
        appearances[0]["intervals"],
        json!([{ "startSecs": 0.0, "endSecs": 9.0, "confidence": 0.91 }])
    );
}

#[tokio::test]
async fn missing_video_id_is_explicit_client_error() {
    let (app, recognizer) = build_test_app(vec![two_chunk_video()], ScriptedRecognizer::new());

    let response = post_json(app, "/processVideo", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Missing videoId" }));
    assert_eq!(recognizer.total_calls(), 0);
}

#[tokio::test]
async fn malformed_body_is_client_error() {
    let (app, _) = build_test_app(vec![two_chunk_video()], ScriptedRecognizer::new());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/processVideo")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn unknown_video_is_not_found() {
    let (app, _) = build_test_app(vec![two_chunk_video()], ScriptedRecognizer::new());

    let response = post_json(app, "/processVideo", json!({ "videoId": "v404" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Video v404 not found");
}

#[tokio::test]
async fn chunk_outside_video_is_client_error() {
    let (app, _) = build_test_app(vec![two_chunk_video()], ScriptedRecognizer::new());

    let response = post_json(app, "/processVideo", json!({ "videoId": "v1", "chunkId": "c9" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("c9"));
}

#[tokio::test]
async fn partial_failure_is_reported_in_success_payload() {
    let recognizer = ScriptedRecognizer::new()
        .push("c1", Scripted::Detections(vec![RawDetection::new("p1", 0.0, 5.0, 0.8)]))
        .always("c2", Scripted::Transient);
    let (app, recognizer) = build_test_app(vec![two_chunk_video()], recognizer);

    let response = post_json(app, "/processVideo", json!({ "videoId": "v1" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["chunksProcessed"], 1);
    assert_eq!(json["chunksFailed"], 1);
    assert_eq!(json["videoStatus"], "partial");
    assert_eq!(json["outcome"], "partially_done");
    assert_eq!(json["failures"][0]["chunkId"], "c2");
    assert_eq!(json["failures"][0]["attempts"], 3);
    assert_eq!(recognizer.calls("c2"), 3);
}

#[tokio::test]
async fn all_chunks_failing_marks_video_failed() {
    let recognizer = ScriptedRecognizer::new()
        .always("c1", Scripted::Permanent)
        .always("c2", Scripted::Permanent);
    let (app, _) = build_test_app(vec![two_chunk_video()], recognizer);

    let json = body_json(post_json(app, "/processVideo", json!({ "videoId": "v1" })).await).await;
    assert_eq!(json["videoStatus"], "failed");
    assert_eq!(json["outcome"], "nothing_done");
    assert_eq!(json["chunksFailed"], 2);
}

#[tokio::test]
async fn repeated_request_dispatches_nothing_new() {
    let (app, recognizer) = build_test_app(vec![two_chunk_video()], p1_in_both_chunks());

    post_json(app.clone(), "/processVideo", json!({ "videoId": "v1" })).await;
    let response = post_json(app.clone(), "/processVideo", json!({ "videoId": "v1" })).await;

    let json = body_json(response).await;
    assert_eq!(json["chunksProcessed"], 0);
    assert_eq!(json["outcome"], "nothing_done");
    assert_eq!(json["videoStatus"], "complete");
    assert_eq!(recognizer.total_calls(), 2);

    let video = body_json(get(app, "/videos/v1").await).await;
    assert_eq!(video["status"], "complete");
    assert_eq!(video["appearances"][0]["intervals"][0]["endSecs"], 9.0);
}

#[tokio::test]
async fn store_fault_is_internal_error_and_request_can_be_repeated() {
    let store =
        FlakyStore::new(InMemoryStore::with_videos([two_chunk_video()])).fail_once(StoreOp::SaveAnalysis);
    let (app, recognizer) = build_app_with_store(Arc::new(store), p1_in_both_chunks());

    let response = post_json(app.clone(), "/processVideo", json!({ "videoId": "v1" })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());

    let response = post_json(app.clone(), "/processVideo", json!({ "videoId": "v1" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["chunksProcessed"], 0);
    assert_eq!(json["videoStatus"], "complete");
    assert_eq!(json["newAppearances"][0]["personId"], "p1");
    assert_eq!(recognizer.total_calls(), 2);

    let video = body_json(get(app, "/videos/v1").await).await;
    assert_eq!(
        video["appearances"][0]["intervals"],
        json!([{ "startSecs": 0.0, "endSecs": 9.0, "confidence": 0.91 }])
    );
}

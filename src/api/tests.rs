use super::*;
use crate::store::FixtureStore;
use crate::types::{AlertId, ArtifactPayload, JobId, JobState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

const RETENTION: Duration = Duration::from_secs(900);

/// Build a router plus handles to the registry and store behind it
fn test_app(store: FixtureStore) -> (Router, JobRegistry, Arc<FixtureStore>) {
    let store = Arc::new(store);
    let registry = JobRegistry::new(store.clone(), RETENTION);
    let app = create_router(registry.clone(), store.clone());
    (app, registry, store)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_state(registry: &JobRegistry, job_id: &JobId, expected: JobState) {
    for _ in 0..200 {
        if registry.job_state(job_id).await == Some(expected.clone()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached {expected}");
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let (app, _, _) = test_app(FixtureStore::new());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let (app, _, _) = test_app(FixtureStore::new());

    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/alerts/{alert_id}/export/job"].is_object());
}

#[tokio::test]
async fn create_job_returns_201_with_job_id() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, _, _) = test_app(store);

    let response = app
        .oneshot(post_req("/alerts/A1/export/job"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert!(
        json["job_id"].as_str().is_some_and(|s| !s.is_empty()),
        "job_id missing from creation body: {json}"
    );
}

#[tokio::test]
async fn create_job_for_unknown_alert_is_404_json() {
    let (app, _, _) = test_app(FixtureStore::new());

    let response = app
        .oneshot(post_req("/alerts/nope/export/job"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "alert nope not found");
}

#[tokio::test]
async fn status_of_running_job_is_202_with_message() {
    let store = FixtureStore::with_latency(Duration::from_secs(30));
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn status_of_completed_job_is_200() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Complete).await;

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "complete");
}

#[tokio::test]
async fn status_of_failed_job_is_500_with_reason() {
    let store = FixtureStore::new();
    store.put_failure("A1", "sensor offline").await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Failed).await;

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["message"], "sensor offline");
}

#[tokio::test]
async fn status_of_unknown_job_is_404() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, _, _) = test_app(store);

    let response = app
        .oneshot(get("/alerts/A1/export/status/never-issued"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn download_serves_bytes_with_disposition_filename() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::new(b"PCAP...".to_vec(), "cap.pcapng"))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Complete).await;

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/download/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        routes::PCAP_CONTENT_TYPE
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"cap.pcapng\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"PCAP...");
}

#[tokio::test]
async fn download_without_suggested_name_falls_back_to_alert_name() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"PCAP".to_vec()))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Complete).await;

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/download/{job_id}")))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"alert_A1.pcap\""
    );
}

#[tokio::test]
async fn download_before_completion_is_409_json() {
    let store = FixtureStore::with_latency(Duration::from_secs(30));
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/download/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn download_of_failed_job_is_json_error() {
    let store = FixtureStore::new();
    store.put_failure("A1", "sensor offline").await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Failed).await;

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/download/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert!(
        json["error"].as_str().unwrap().contains("sensor offline"),
        "failure reason should survive to the error body: {json}"
    );
}

#[tokio::test]
async fn direct_fetch_serves_bytes_inline() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::new(b"PCAP".to_vec(), "direct.pcap"))
        .await;
    let (app, _, _) = test_app(store);

    let response = app
        .oneshot(get("/alerts/A1/export/direct"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        routes::PCAP_CONTENT_TYPE
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"direct.pcap\""
    );
}

#[tokio::test]
async fn direct_fetch_failure_is_json_error_body() {
    let store = FixtureStore::new();
    store.put_failure("A1", "export too large").await;
    let (app, _, _) = test_app(store);

    let response = app
        .oneshot(get("/alerts/A1/export/direct"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap(),
        "application/json"
    );

    let json = body_json(response).await;
    assert_eq!(json["error"], "export too large");
}

#[tokio::test]
async fn direct_fetch_of_unknown_alert_is_404() {
    let (app, _, _) = test_app(FixtureStore::new());

    let response = app
        .oneshot(get("/alerts/nope/export/direct"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn close_job_is_204_and_disposes() {
    let store = FixtureStore::new();
    store
        .put_artifact("A1", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let (app, registry, _) = test_app(store);

    let job_id = registry.create_job(&AlertId::new("A1")).await.unwrap();
    wait_for_state(&registry, &job_id, JobState::Complete).await;

    let response = app
        .clone()
        .oneshot(delete_req(&format!("/alerts/A1/export/job/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/alerts/A1/export/status/{job_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

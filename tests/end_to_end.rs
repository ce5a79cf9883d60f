//! Full-pipeline tests: a real registry server on a loopback port, driven by
//! the exporter over actual HTTP.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use evidence_dl::{
    AlertId, ArtifactPayload, Config, Error, EvidenceExporter, FixtureStore, JobRegistry,
    api::create_router,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

struct TestServer {
    api_url: Url,
    registry: JobRegistry,
    _serve: tokio::task::JoinHandle<()>,
}

/// Bind a registry server on an ephemeral loopback port
async fn spawn_server(store: FixtureStore) -> TestServer {
    let store = Arc::new(store);
    let registry = JobRegistry::new(store.clone(), Duration::from_secs(900));
    let app = create_router(registry.clone(), store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        api_url: Url::parse(&format!("http://{addr}/")).unwrap(),
        registry,
        _serve: serve,
    }
}

fn exporter_for(server: &TestServer, download_dir: &TempDir) -> EvidenceExporter {
    let mut config = Config::default();
    config.api_url = server.api_url.clone();
    config.export.poll_interval = Duration::from_millis(25);
    config.export.max_poll_attempts = 20;
    config.export.download_dir = download_dir.path().to_path_buf();
    EvidenceExporter::new(config).unwrap()
}

#[tokio::test]
async fn queued_export_delivers_artifact_and_closes_job() {
    let store = FixtureStore::with_latency(Duration::from_millis(100));
    store
        .put_artifact("alert-42", ArtifactPayload::new(b"PCAP...".to_vec(), "cap.pcapng"))
        .await;
    let server = spawn_server(store).await;
    let download_dir = tempfile::tempdir().unwrap();

    let exporter = exporter_for(&server, &download_dir);
    let delivered = exporter
        .export_queued(&AlertId::new("alert-42"))
        .await
        .unwrap();

    assert_eq!(delivered.filename, "cap.pcapng");
    assert_eq!(std::fs::read(&delivered.path).unwrap(), b"PCAP...");
    assert!(delivered.path.starts_with(download_dir.path()));

    // The orchestrator disposed the job after delivery
    assert_eq!(server.registry.job_count().await, 0);
}

#[tokio::test]
async fn queued_export_of_failing_alert_surfaces_reason_and_closes_job() {
    let store = FixtureStore::new();
    store.put_failure("alert-42", "sensor offline").await;
    let server = spawn_server(store).await;
    let download_dir = tempfile::tempdir().unwrap();

    let exporter = exporter_for(&server, &download_dir);
    let err = exporter
        .export_queued(&AlertId::new("alert-42"))
        .await
        .unwrap_err();

    match err {
        Error::JobFailed { message } => assert_eq!(message, "sensor offline"),
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert_eq!(server.registry.job_count().await, 0);
}

#[tokio::test]
async fn queued_export_times_out_on_a_never_finishing_job() {
    let store = FixtureStore::with_latency(Duration::from_secs(120));
    store
        .put_artifact("alert-42", ArtifactPayload::unnamed(b"X".to_vec()))
        .await;
    let server = spawn_server(store).await;
    let download_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.api_url = server.api_url.clone();
    config.export.poll_interval = Duration::from_millis(10);
    config.export.max_poll_attempts = 3;
    config.export.download_dir = download_dir.path().to_path_buf();
    let exporter = EvidenceExporter::new(config).unwrap();

    let err = exporter
        .export_queued(&AlertId::new("alert-42"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 3 }));

    // Timed-out jobs are closed rather than abandoned
    assert_eq!(server.registry.job_count().await, 0);
}

#[tokio::test]
async fn queued_export_of_unknown_alert_is_invalid_alert() {
    let server = spawn_server(FixtureStore::new()).await;
    let download_dir = tempfile::tempdir().unwrap();

    let exporter = exporter_for(&server, &download_dir);
    let err = exporter
        .export_queued(&AlertId::new("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAlert(id) if id.as_str() == "nope"));
}

#[tokio::test]
async fn direct_export_delivers_without_a_job() {
    let store = FixtureStore::new();
    store
        .put_artifact("alert-42", ArtifactPayload::new(b"PCAP".to_vec(), "direct.pcap"))
        .await;
    let server = spawn_server(store).await;
    let download_dir = tempfile::tempdir().unwrap();

    let exporter = exporter_for(&server, &download_dir);
    let delivered = exporter
        .export_direct(&AlertId::new("alert-42"))
        .await
        .unwrap();

    assert_eq!(delivered.filename, "direct.pcap");
    assert_eq!(std::fs::read(&delivered.path).unwrap(), b"PCAP");
    assert_eq!(server.registry.job_count().await, 0);
}

#[tokio::test]
async fn direct_export_failure_writes_nothing() {
    let store = FixtureStore::new();
    store.put_failure("alert-42", "export too large").await;
    let server = spawn_server(store).await;
    let download_dir = tempfile::tempdir().unwrap();

    let exporter = exporter_for(&server, &download_dir);
    let err = exporter
        .export_direct(&AlertId::new("alert-42"))
        .await
        .unwrap_err();

    match err {
        Error::JobFailed { message } => assert_eq!(message, "export too large"),
        other => panic!("expected JobFailed, got {other:?}"),
    }

    let entries: Vec<_> = std::fs::read_dir(download_dir.path()).unwrap().collect();
    assert!(entries.is_empty(), "error body must never land on disk");
}

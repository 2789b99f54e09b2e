//! HTTP-level tests for the file-age exporter
//!
//! Each test starts a real exporter on a scratch directory and drives the
//! router in-process with `tower::ServiceExt::oneshot`.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use fileage_core::{Exporter, ExporterConfig, ExporterConfigBuilder};
use fileage_server::create_router;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};
use tower::ServiceExt;

fn place(path: &Path, mtime: SystemTime) {
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    let tmp = path.with_file_name(format!(".{}.tmp", name));
    let file = File::create(&tmp).unwrap();
    file.set_modified(mtime).unwrap();
    drop(file);
    fs::rename(&tmp, path).unwrap();
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    cond()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn start(builder: ExporterConfigBuilder) -> (Arc<Exporter>, Router) {
    let exporter = Exporter::start(builder.build()).await.unwrap();
    let router = create_router(Arc::clone(&exporter));
    // Marker files written from here on are newer than startup.
    sleep(Duration::from_millis(20)).await;
    (exporter, router)
}

#[tokio::test]
async fn test_no_files_yet() {
    let dir = tempfile::tempdir().unwrap();
    let end = dir.path().join("update.end");
    let (_exporter, router) = start(ExporterConfig::builder().end_file(&end).grace(Duration::ZERO)).await;

    let (status, body) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("update_count_total 0"));
    assert!(!body.contains("update_age_seconds"));
    assert!(!body.contains("update_running"));

    let (status, body) = get(&router, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        "last_update: 0001-01-01T00:00:00Z\r\n# time 0001-01-01T00:00:00Z means never.\r\n# alive/healthy: false\r\n"
    );

    let (status, _) = get(&router, "/liveness").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_grace_window_covers_health_but_not_liveness() {
    let dir = tempfile::tempdir().unwrap();
    let end = dir.path().join("update.end");
    let (_exporter, router) = start(
        ExporterConfig::builder()
            .end_file(&end)
            .grace(Duration::from_millis(400)),
    )
    .await;

    let (status, body) = get(&router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.ends_with("# alive/healthy: true\r\n"));

    let (status, _) = get(&router, "/liveness").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    sleep(Duration::from_millis(500)).await;
    let (status, _) = get(&router, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_end_file_makes_probes_good() {
    let dir = tempfile::tempdir().unwrap();
    let end = dir.path().join("update.end");
    let (exporter, router) = start(ExporterConfig::builder().end_file(&end).grace(Duration::ZERO)).await;

    place(&end, SystemTime::now());
    assert!(wait_until(|| exporter.metrics().update_count() == 1).await);

    let (status, body) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("update_count_total 1"));
    assert!(body.contains("update_age_seconds "));

    let (status, body) = get(&router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(&format!(
        "last_update: {}\r\n",
        exporter.last_update().to_rfc3339_nano()
    )));
    assert!(body.ends_with("# alive/healthy: true\r\n"));

    let (status, _) = get(&router, "/liveness").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_run_cycle_is_visible_in_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let start_file = dir.path().join("update.start");
    let end = dir.path().join("update.end");
    let (exporter, router) = start(
        ExporterConfig::builder()
            .start_file(&start_file)
            .end_file(&end),
    )
    .await;

    let begun = SystemTime::now();
    place(&start_file, begun);
    assert!(wait_until(|| exporter.metrics().running() == 1).await);

    let (_, body) = get(&router, "/metrics").await;
    assert!(body.contains("update_running 1"));
    assert!(body.contains("update_count_total 0"));

    place(&end, begun + Duration::from_secs(3));
    assert!(wait_until(|| exporter.metrics().update_count() == 1).await);

    let (_, body) = get(&router, "/metrics").await;
    assert!(body.contains("update_running 0"));
    assert!(body.contains("update_count_total 1"));
    assert!(body.contains("update_duration_seconds_count 1"));
    assert!(body.contains("update_duration_seconds_sum 3"));
}

#[tokio::test]
async fn test_end_older_than_start_is_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    let start_file = dir.path().join("update.start");
    let end = dir.path().join("update.end");
    let (exporter, router) = start(
        ExporterConfig::builder()
            .start_file(&start_file)
            .end_file(&end),
    )
    .await;

    let begun = SystemTime::now() + Duration::from_secs(10);
    place(&start_file, begun);
    assert!(wait_until(|| exporter.metrics().running() == 1).await);

    place(&end, begun - Duration::from_secs(5));
    assert!(wait_until(|| !exporter.last_update().is_absent()).await);
    sleep(Duration::from_millis(100)).await;

    let (_, body) = get(&router, "/metrics").await;
    assert!(body.contains("update_count_total 0"));
    assert!(body.contains("update_running 1"));
    assert!(!body.contains("update_duration_seconds_count"));
}

#[tokio::test]
async fn test_custom_endpoints_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let end = dir.path().join("update.end");
    let (_exporter, router) = start(
        ExporterConfig::builder()
            .end_file(&end)
            .endpoints("/prom", "/ready", "/alive")
            .labels("batch", "nightly"),
    )
    .await;

    let (status, body) = get(&router, "/prom").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("batch_nightly_update_count_total 0"));

    let (status, _) = get(&router, "/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&router, "/alive").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_close_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let end = dir.path().join("update.end");
    let (_exporter, router) = start(ExporterConfig::builder().end_file(&end)).await;

    for uri in ["/metrics", "/healthz", "/liveness"] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::CONNECTION).unwrap(),
            "close",
            "{}",
            uri
        );
    }
}

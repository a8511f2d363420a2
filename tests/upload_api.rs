//! Integration tests for the detection upload API
//!
//! Drives the full router against the in-memory record store and a
//! temporary staging/archive tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot` method

use oneshield_detect::{config::Config, create_router, models::DetectionStore, AppState};

const BOUNDARY: &str = "oneshield-test-boundary";

/// Test helper: Build app state rooted in a temp dir
fn setup_state(root: &Path, extra: &[(&str, &str)]) -> AppState {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("RECORD_STORE".into(), "memory".into());
    vars.insert("UPLOAD_DIR".into(), root.join("uploads").display().to_string());
    vars.insert("ARCHIVE_DIR".into(), root.join("archive").display().to_string());
    vars.insert("ARCHIVE_RETRY_DELAY_MS".into(), "10".into());
    vars.insert("SIMULATED_POSITIVE_RATE".into(), "0".into());
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("Should build config");
    AppState::build(config, DetectionStore::memory()).expect("Should build state")
}

/// Test helper: Multipart upload request with one `file` field
fn upload_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/detection/upload")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}

/// Archival is detached from the response; poll until it lands
async fn wait_for_file(dir: &Path) -> PathBuf {
    for _ in 0..250 {
        if let Some(path) = files_in(dir).into_iter().next() {
            return path;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("No file appeared in {}", dir.display());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_mode() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(setup_state(dir.path(), &[]));

    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["prediction_mode"], "simulated");
    assert_eq!(body["record_store"], "memory");
}

// =============================================================================
// Simulated mode
// =============================================================================

#[tokio::test]
async fn test_zero_file_is_recorded_and_archived() {
    let dir = tempfile::tempdir().unwrap();
    let state = setup_state(dir.path(), &[]);
    let app = create_router(state.clone());

    let response = app
        .oneshot(upload_request("file", "zeros.exe", &[0u8; 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["filename"], "zeros.exe");
    assert_eq!(body["fileSize"], 1024);
    assert_eq!(body["entropyScore"], 0.0);
    assert_eq!(body["isRansomware"], false);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=0.2).contains(&confidence));
    assert_eq!(body["hash"].as_str().unwrap().len(), 64);

    let stored = state.orchestrator.store().recent(10).await.unwrap();
    assert_eq!(stored.len(), 1);

    let archived = wait_for_file(&dir.path().join("archive").join("success")).await;
    assert!(archived.to_string_lossy().ends_with("-zeros.exe"));
    assert!(files_in(&dir.path().join("uploads")).is_empty());
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = setup_state(dir.path(), &[]);

    for name in ["first.exe", "second.msi"] {
        let response = create_router(state.clone())
            .oneshot(upload_request("file", name, b"MZ\x90\x00"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder().uri("/api/detection").body(Body::empty()).unwrap();
    let response = create_router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["filename"], "second.msi");
    assert_eq!(items[1]["filename"], "first.exe");
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_wrong_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = setup_state(dir.path(), &[]);

    let response = create_router(state.clone())
        .oneshot(upload_request("file", "notes.txt", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Only .exe and .msi files are allowed");
    assert!(state.orchestrator.store().recent(10).await.unwrap().is_empty());
    assert!(files_in(&dir.path().join("uploads")).is_empty());
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(setup_state(dir.path(), &[]));

    let response = app
        .oneshot(upload_request("attachment", "setup.exe", b"MZ"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversize_upload_is_rejected_and_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let state = setup_state(dir.path(), &[("MAX_UPLOAD_BYTES", "16")]);

    let response = create_router(state.clone())
        .oneshot(upload_request("file", "big.exe", &[7u8; 64]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(files_in(&dir.path().join("uploads")).is_empty());
    assert!(state.orchestrator.store().recent(10).await.unwrap().is_empty());
}

// =============================================================================
// Degraded backends
// =============================================================================

#[tokio::test]
async fn test_unresponsive_remote_service_degrades() {
    // Accept connections but never answer
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let base_url = format!("http://{}", addr);
    let state = setup_state(
        dir.path(),
        &[
            ("PREDICTION_MODE", "remote"),
            ("REMOTE_BASE_URL", base_url.as_str()),
            ("REMOTE_TIMEOUT_SECS", "1"),
        ],
    );

    let response = create_router(state)
        .oneshot(upload_request("file", "setup.exe", b"MZ\x90\x00\x03"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["hash"], "remote-service-error");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["isRansomware"], false);
    assert_eq!(body["fileSize"], 5);

    wait_for_file(&dir.path().join("archive").join("error")).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_worker_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let state = setup_state(
        dir.path(),
        &[
            ("PREDICTION_MODE", "worker"),
            ("WORKER_PROGRAM", "sh"),
            ("WORKER_ARGS", "-c false"),
        ],
    );

    let response = create_router(state)
        .oneshot(upload_request("file", "installer.msi", b"\xd0\xcf\x11\xe0"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["hash"], "worker-error");
    assert_eq!(body["confidence"], 0.0);

    let archived = wait_for_file(&dir.path().join("archive").join("error")).await;
    assert!(archived.to_string_lossy().ends_with("-installer.msi"));
    assert!(files_in(&dir.path().join("archive").join("success")).is_empty());
}

// =============================================================================
// Dropped requests
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_dropped_request_still_archives_upload() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("slow_worker.sh");
    std::fs::write(&script, "sleep 1\n").unwrap();
    let script_arg = script.display().to_string();
    let state = setup_state(
        dir.path(),
        &[
            ("PREDICTION_MODE", "worker"),
            ("WORKER_PROGRAM", "sh"),
            ("WORKER_ARGS", script_arg.as_str()),
        ],
    );

    // Client gives up while the worker is still running
    let request = create_router(state).oneshot(upload_request("file", "slow.exe", b"MZ\x90\x00"));
    let result = tokio::time::timeout(Duration::from_millis(300), request).await;
    assert!(result.is_err());

    let archived = wait_for_file(&dir.path().join("archive").join("error")).await;
    assert!(archived.to_string_lossy().ends_with("-slow.exe"));
    assert!(files_in(&dir.path().join("uploads")).is_empty());
}

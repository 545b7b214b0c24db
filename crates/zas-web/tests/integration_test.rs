//! End-to-end tests for the HTTP API against temporary plugin paths

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use zas_core::{Error, PluginPaths, Result, ScheduleActivator, VolumeBackend};
use zas_web::{create_router, AppState, StreamTiming};

struct StaticBackend;

#[async_trait]
impl VolumeBackend for StaticBackend {
    async fn enumerate_pools(&self) -> Result<Vec<String>> {
        Ok(vec!["tank".to_string()])
    }

    async fn enumerate_volumes(&self, _pool: &str) -> Result<Vec<String>> {
        Ok(vec!["tank".to_string(), "tank/appdata".to_string()])
    }

    async fn enumerate_all_volumes(&self) -> Result<Vec<String>> {
        Ok(vec!["tank".to_string(), "tank/appdata".to_string()])
    }
}

struct Activator {
    fail: bool,
}

#[async_trait]
impl ScheduleActivator for Activator {
    async fn activate(&self) -> Result<()> {
        if self.fail {
            Err(Error::activation("cron reload failed"))
        } else {
            Ok(())
        }
    }
}

struct TestApp {
    _dir: TempDir,
    paths: PluginPaths,
    router: Router,
}

fn app_with(fail_activation: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let paths = PluginPaths::under(dir.path());
    let state = AppState::with_collaborators(
        paths.clone(),
        Arc::new(StaticBackend),
        Arc::new(Activator {
            fail: fail_activation,
        }),
    )
    .with_stream_timing(StreamTiming {
        duration: Duration::ZERO,
        interval: Duration::from_millis(10),
    });
    let router = Router::new().nest("/api", create_router(Arc::new(state)));
    TestApp {
        _dir: dir,
        paths,
        router,
    }
}

fn app() -> TestApp {
    app_with(false)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn valid_settings() -> Value {
    json!({
        "prefix": "auto-",
        "keep_all_for_days": "14",
        "keep_daily_until_days": "30",
        "keep_weekly_until_days": "183",
        "schedule_mode": "minutes",
        "schedule_every_minutes": "15",
        "datasets": {
            "names": ["tank", "tank/appdata"],
            "selected": ["0", "1"],
            "thresholds": ["100G", "250g"]
        }
    })
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, _, body) = get(&app.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["run_in_progress"], false);

    fs::create_dir(&app.paths.run_lock_dir).unwrap();
    let (_, _, body) = get(&app.router, "/api/health").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["run_in_progress"], true);
}

#[tokio::test]
async fn test_settings_view() {
    let app = app();
    let (status, headers, body) = get(&app.router, "/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["pragma"], "no-cache");

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["cron"], "(disabled)");
    assert_eq!(json["config"]["prefix"], "autosnapshot-");
    assert_eq!(json["datasets"].as_array().unwrap().len(), 2);
    assert_eq!(json["pools"][0]["pool"], "tank");
}

#[tokio::test]
async fn test_settings_submit_applies() {
    let app = app();
    let (status, json) = post_json(&app.router, "/api/settings", valid_settings()).await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["ok"], true);
    assert_eq!(json["saved"], true);
    assert_eq!(json["applied"], true);
    assert_eq!(json["cron"], "*/15 * * * *");
    assert_eq!(json["notices"][0], "Settings saved and schedule applied.");

    let saved = fs::read_to_string(&app.paths.config_file).unwrap();
    assert!(saved.contains("DATASETS=\"tank/appdata:250G\""));
    assert!(saved.contains("CRON_SCHEDULE=\"*/15 * * * *\""));
}

#[tokio::test]
async fn test_settings_validation_is_unprocessable() {
    let app = app();
    let mut body = valid_settings();
    body["keep_all_for_days"] = json!("30");
    let (status, json) = post_json(&app.router, "/api/settings", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["saved"], false);
    assert_eq!(
        json["errors"][0],
        "Retention must follow: keep all < keep daily until < keep weekly until."
    );
    assert!(!app.paths.config_file.exists());
}

#[tokio::test]
async fn test_settings_activation_failure_still_saves() {
    let app = app_with(true);
    let (status, json) = post_json(&app.router, "/api/settings", valid_settings()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], false);
    assert_eq!(json["saved"], true);
    assert_eq!(json["applied"], false);
    assert_eq!(
        json["errors"][0],
        "Settings saved, but failed to apply scheduler: cron reload failed"
    );
    assert!(app.paths.config_file.exists());
}

#[tokio::test]
async fn test_run_requires_post() {
    let app = app();
    let (status, _, body) = get(&app.router, "/api/run").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "Use POST for manual run requests.");
}

#[tokio::test]
async fn test_run_without_worker() {
    let app = app();
    let (status, json) = post_json(&app.router, "/api/run", json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Snapshot script is missing or not executable.");
}

#[tokio::test]
async fn test_run_conflict_while_locked() {
    let app = app();
    fs::write(&app.paths.worker, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&app.paths.worker, fs::Permissions::from_mode(0o755)).unwrap();
    let _held = zas_core::lock::try_exclusive(&app.paths.run_lock)
        .unwrap()
        .unwrap();

    let (status, json) = post_json(&app.router, "/api/run", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "A snapshot run is already in progress.");
}

#[tokio::test]
async fn test_logs_one_shot() {
    let app = app();
    fs::write(&app.paths.debug_log, "a\nb\nc\n").unwrap();

    let (status, headers, body) = get(&app.router, "/api/logs?type=DEBUG&lines=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["cache-control"],
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["type"], "debug");
    assert_eq!(json["exists"], true);
    assert_eq!(json["content"], "a\nb\nc\n");

    let (_, _, body) = get(&app.router, "/api/logs").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["type"], "summary");
    assert_eq!(json["exists"], false);
    assert_eq!(json["content"], "");
}

#[tokio::test]
async fn test_logs_download() {
    let app = app();
    fs::write(&app.paths.summary_log, "run ok\n").unwrap();

    let (status, headers, body) = get(&app.router, "/api/logs?download=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=\"zfs_autosnapshot_logs.txt\""
    );
    let text = String::from_utf8(body).unwrap();
    assert!(text.starts_with("ZFS Auto Snapshot Log Export\n"));
    assert!(text.contains("Log file is not present."));
    assert!(text.contains("run ok\n"));
}

#[tokio::test]
async fn test_logs_download_includes_whole_large_log() {
    let app = app();
    let big: String = (0..50_000).map(|i| format!("snapshot line {}\n", i)).collect();
    fs::write(&app.paths.debug_log, &big).unwrap();

    let (status, _, body) = get(&app.router, "/api/logs?download=1").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains(&format!("=====\n{}\n", big)));
    assert!(text.ends_with("Log file is not present.\n"));
}

#[tokio::test]
async fn test_log_stream_emits_payload() {
    let app = app();
    fs::write(&app.paths.summary_log, "hello\n").unwrap();

    let (status, headers, body) = get(&app.router, "/api/logs/stream?lines=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-accel-buffering"], "no");
    assert!(headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(body).unwrap();
    assert!(text.starts_with("event: payload\ndata: "), "{}", text);
    assert!(text.contains("\"content\":\"hello\\n\""));
}

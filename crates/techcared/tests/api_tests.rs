//! HTTP API tests against an in-process router with a fixed snapshot.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use techcared::cleaner::{Cleaner, CleanerPaths};
use techcared::snapshot::*;
use techcared::{maintenance, server, AppState, Config};
use tempfile::TempDir;
use tower::ServiceExt;

const GB: u64 = 1024 * 1024 * 1024;
const ADMIN_PASSWORD: &str = "admin-pass-123";

/// A machine with a nearly full root disk and nothing else wrong
struct FixedSource;

impl SnapshotSource for FixedSource {
    fn collect(&self) -> SystemSnapshot {
        SystemSnapshot {
            collected_at: chrono::Utc::now(),
            cpu: CpuSnapshot {
                logical_threads: 4,
                usage_percent: 10.0,
                per_core: vec![10.0; 4],
                ..Default::default()
            },
            memory: MemorySnapshot {
                total_bytes: 16 * GB,
                used_bytes: 4 * GB,
                available_bytes: 12 * GB,
                ..Default::default()
            },
            disks: vec![DiskSnapshot {
                mount: "/".into(),
                fs_type: "ext4".into(),
                total_bytes: 100 * GB,
                available_bytes: 2 * GB,
                kind: DiskKind::Ssd,
                removable: false,
            }],
            network: NetworkSnapshot {
                interfaces: vec![],
                connectivity: Some(Connectivity {
                    target: "test:443".into(),
                    connected: true,
                    latency_ms: Some(10),
                }),
            },
            security: SecuritySnapshot {
                firewall: FirewallState::Active,
                firewall_tool: Some("ufw".into()),
                pending_updates: Some(0),
            },
            drivers: DriverSnapshot {
                pci_devices: Some(vec![]),
                failed_module_units: vec![],
            },
            ..Default::default()
        }
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

fn app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    config.auth.jwt_secret = "test-secret".into();
    config.auth.bootstrap_password = Some(ADMIN_PASSWORD.into());

    let tmp = dir.path().join("tmp");
    std::fs::create_dir_all(&tmp).unwrap();
    let paths = CleanerPaths {
        temp_roots: vec![tmp],
        ..Default::default()
    };
    let cleaner = Cleaner::new(paths, &config.cleaner).unwrap();

    let state = Arc::new(AppState::new(config, Arc::new(FixedSource), cleaner).unwrap());
    TestApp {
        router: server::router(state.clone()),
        state,
        _dir: dir,
    }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &TestApp, username: &str, password: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

async fn admin_token(app: &TestApp) -> String {
    login(app, "admin", ADMIN_PASSWORD).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn register_viewer(app: &TestApp, username: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "viewer-pass-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    login(app, username, "viewer-pass-1").await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["analyzers"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/v1/diagnostics/run", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = send(
        &app,
        Method::GET,
        "/v1/diagnostics/latest",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_reports_role_and_dashboard() {
    let app = app();
    let body = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(body["role"], "admin_master");
    assert_eq!(body["dashboard_path"], "/admin/dashboard");
    assert_eq!(body["token_type"], "Bearer");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn test_refresh_requires_refresh_token() {
    let app = app();
    let tokens = login(&app, "admin", ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": tokens["access_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": tokens["refresh_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap();
    let (status, me) = send(&app, Method::GET, "/v1/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
}

#[tokio::test]
async fn test_self_registration_is_always_viewer() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "username": "mallory",
            "email": "mallory@example.com",
            "password": "long-enough-1",
            "role": "admin_master",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "viewer");

    let admin = admin_token(&app).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        Some(&admin),
        Some(json!({
            "username": "tech",
            "email": "tech@example.com",
            "password": "long-enough-1",
            "role": "technician",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "technician");

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "username": "MALLORY",
            "email": "other@example.com",
            "password": "long-enough-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_viewer_cannot_run_diagnostics_or_manage_users() {
    let app = app();
    let viewer = register_viewer(&app, "vera").await;

    let (status, body) = send(&app, Method::POST, "/v1/diagnostics/run", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(&app, Method::GET, "/v1/admin/users", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/v1/system/info", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_diagnostic_to_repair_plan() {
    let app = app();
    let admin = admin_token(&app).await;

    let (status, _) = send(&app, Method::GET, "/v1/diagnostics/latest", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = send(&app, Method::POST, "/v1/diagnostics/run", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let problems = report["problems"].as_array().unwrap();
    assert!(problems
        .iter()
        .any(|p| p["title"].as_str().unwrap().starts_with("Low disk space")));
    assert!(report["health_score"].as_u64().unwrap() < 100);

    let id = report["id"].as_str().unwrap();
    let (status, latest) = send(&app, Method::GET, "/v1/diagnostics/latest", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], id);

    let (status, history) = send(&app, Method::GET, "/v1/diagnostics?limit=5", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, plan) = send(
        &app,
        Method::POST,
        "/v1/repair/plans",
        Some(&admin),
        Some(json!({ "diagnostic_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["diagnostic_id"], id);
    let steps = plan["steps"].as_array().unwrap();
    assert!(!steps.is_empty());

    let plan_id = plan["id"].as_str().unwrap();
    let step_id = steps[0]["id"].as_str().unwrap();
    let (status, update) = send(
        &app,
        Method::POST,
        &format!("/v1/repair/plans/{}/steps/{}/complete", plan_id, step_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["progress"]["completed"], 1);
    assert_eq!(update["progress"]["total"], steps.len());
}

#[tokio::test]
async fn test_reports_are_private_to_owner() {
    let app = app();
    let admin = admin_token(&app).await;
    let (_, report) = send(&app, Method::POST, "/v1/diagnostics/run", Some(&admin), None).await;
    let uri = format!("/v1/diagnostics/{}", report["id"].as_str().unwrap());

    let viewer = register_viewer(&app, "vince").await;
    let (status, _) = send(&app, Method::GET, &uri, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_chat_and_guide_flow() {
    let app = app();
    let viewer = register_viewer(&app, "carol").await;

    let (status, session) = send(&app, Method::POST, "/v1/chat/sessions", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!session["greeting"].as_str().unwrap().is_empty());
    let base = format!("/v1/chat/sessions/{}", session["id"].as_str().unwrap());

    let (status, reply) = send(
        &app,
        Method::POST,
        &format!("{}/messages", base),
        Some(&viewer),
        Some(json!({ "text": "my computer is very slow" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!reply["reply"].as_str().unwrap().is_empty());

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{}/messages", base),
        Some(&viewer),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, guide) = send(
        &app,
        Method::POST,
        &format!("{}/guide", base),
        Some(&viewer),
        Some(json!({ "kind": "disk_space" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guide["current"], 0);

    let (status, guide) = send(&app, Method::POST, &format!("{}/guide/next", base), Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guide["current"], 1);

    let (status, view) = send(&app, Method::GET, &base, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["history"].as_array().unwrap().len() >= 3);

    let other = register_viewer(&app, "dave").await;
    let (status, _) = send(&app, Method::GET, &base, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guides_catalog_is_public() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/v1/guides", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_maintenance_plan_crud() {
    let app = app();
    let admin = admin_token(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/maintenance/plans",
        Some(&admin),
        Some(json!({
            "name": "nightly",
            "cleaning": [],
            "frequency": { "every": "daily" },
            "time": "03:00:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, plan) = send(
        &app,
        Method::POST,
        "/v1/maintenance/plans",
        Some(&admin),
        Some(json!({
            "name": "nightly",
            "cleaning": ["temp_files", "logs"],
            "frequency": { "every": "daily" },
            "time": "03:00:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(plan["next_run"].is_string());
    let uri = format!("/v1/maintenance/plans/{}", plan["id"].as_str().unwrap());

    let (status, plan) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({
            "name": "weekly",
            "cleaning": ["recycle_bin"],
            "frequency": { "every": "weekly", "weekday": "Sun" },
            "time": "04:30:00",
            "enabled": false,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["name"], "weekly");
    assert!(plan["next_run"].is_null());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, list) = send(&app, Method::GET, "/v1/maintenance/plans", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cleaner_dry_run() {
    let app = app();
    let admin = admin_token(&app).await;

    let (status, analysis) = send(&app, Method::GET, "/v1/cleaner/analyze", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(analysis["total_reclaimable"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/cleaner/clean",
        Some(&admin),
        Some(json!({ "kinds": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, summary) = send(
        &app,
        Method::POST,
        "/v1/cleaner/clean",
        Some(&admin),
        Some(json!({ "kinds": ["temp_files"], "dry_run": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["dry_run"], true);
}

#[tokio::test]
async fn test_admin_disables_user() {
    let app = app();
    let admin = admin_token(&app).await;
    let viewer = register_viewer(&app, "erin").await;

    let (_, users) = send(&app, Method::GET, "/v1/admin/users", Some(&admin), None).await;
    let erin = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "erin")
        .unwrap()
        .clone();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/v1/admin/users/{}", erin["id"].as_str().unwrap()),
        Some(&admin),
        Some(json!({ "active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);

    // Existing tokens stop working immediately
    let (status, _) = send(&app, Method::GET, "/v1/me", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_preferences_round_trip_clamps_font() {
    let app = app();
    let viewer = register_viewer(&app, "fay").await;

    let (status, prefs) = send(
        &app,
        Method::PUT,
        "/v1/me/preferences",
        Some(&viewer),
        Some(json!({ "theme": "dark", "font_scale": 5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["theme"], "dark");

    let (_, stored) = send(&app, Method::GET, "/v1/me/preferences", Some(&viewer), None).await;
    assert_eq!(stored, prefs);
    assert!(stored["font_scale"].as_f64().unwrap() < 1.61);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = app();
    let body = json!({ "username": "x".repeat(100 * 1024), "password": "y" }).to_string();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_scheduled_runs_are_logged() {
    let app = app();
    let admin = admin_token(&app).await;
    let viewer = register_viewer(&app, "vick").await;

    let (status, plan) = send(
        &app,
        Method::POST,
        "/v1/maintenance/plans",
        Some(&admin),
        Some(json!({
            "name": "nightly",
            "cleaning": ["temp_files"],
            "frequency": { "every": "daily" },
            "time": "03:00:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let later = chrono::Utc::now() + chrono::Duration::days(2);
    assert_eq!(maintenance::run_due(&app.state, later).await, 1);

    let (status, runs) = send(&app, Method::GET, "/v1/maintenance/runs", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["plan_id"], plan["id"]);
    assert_eq!(runs[0]["plan_name"], "nightly");
    assert!(runs[0].get("error").is_none());

    let (status, _) = send(&app, Method::GET, "/v1/maintenance/runs", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rejected_user_update_changes_nothing() {
    let app = app();
    let admin = admin_token(&app).await;
    let (_, me) = send(&app, Method::GET, "/v1/me", Some(&admin), None).await;
    let uri = format!("/v1/admin/users/{}", me["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "role": "technician", "active": false })),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["code"], "invalid_state");

    let (status, me) = send(&app, Method::GET, "/v1/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "admin_master");
    assert_eq!(me["active"], true);
}

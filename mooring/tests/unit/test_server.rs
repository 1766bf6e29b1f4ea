//! HTTP API tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use mooring::app::options::AppOptions;
use mooring::app::state::AppState;
use mooring::containers::mock::MockContainerManager;
use mooring::server::serve::router;
use mooring::store::catalog::Store;

fn app(dir: &tempfile::TempDir) -> Router {
    let mut options = AppOptions::default();
    options.storage = None;
    options.proxy.config_dir = dir.path().to_path_buf();
    let state = AppState::assemble(
        &options,
        Arc::new(Store::in_memory()),
        Arc::new(MockContainerManager::new()),
    );
    router(Arc::new(state.server_state()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(&app(&dir), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "mooring");
}

#[tokio::test]
async fn test_unknown_deployment_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(&app(&dir), "GET", "/deployments/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_deploy_application_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, _) = send(
        &app,
        "PUT",
        "/applications/shop",
        Some(json!({
            "name": "shop",
            "source": {"type": "git", "url": "https://example.com/acme/shop.git"},
            "buildpack": {"type": "dockerfile", "config": {}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, accepted) = send(&app, "POST", "/applications/shop/deployments", Some(json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["deployment_number"], 1);
    assert_eq!(accepted["image_tag"], "mooring/shop:1");
    let id = accepted["id"].as_str().unwrap().to_string();

    // the deployment runs in the background
    let mut deployment = Value::Null;
    for _ in 0..100 {
        let (_, body) = send(&app, "GET", &format!("/deployments/{}", id), None).await;
        deployment = body;
        if deployment["status"] == "running" || deployment["status"] == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(deployment["status"], "running");

    let (status, logs) = send(&app, "GET", &format!("/deployments/{}/logs", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(logs["deploy_logs"]
        .as_str()
        .unwrap()
        .contains("Container deployment completed successfully"));

    // running deployments cannot be cancelled
    let (status, _) = send(&app, "POST", &format!("/deployments/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = send(&app, "GET", "/applications/shop/deployments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_invalid_route_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        &app(&dir),
        "POST",
        "/proxy/routes",
        Some(json!({
            "name": "web",
            "service_name": "web",
            "hostnames": ["app.example.com"],
            "target_url": "not a url",
            "port": 80
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid target url"));
}

#[tokio::test]
async fn test_database_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, db) = send(
        &app,
        "POST",
        "/databases",
        Some(json!({
            "name": "cache",
            "project_id": "p",
            "environment_id": "e",
            "engine": {"type": "redis", "config": {}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = db["id"].as_str().unwrap().to_string();

    let (status, db) = send(&app, "POST", &format!("/databases/{}/deploy", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(db["status"], "running");

    let (status, _) = send(&app, "DELETE", &format!("/databases/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/databases/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

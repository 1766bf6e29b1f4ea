//! Proxy configurator tests

use std::sync::Arc;

use mooring::errors::EngineError;
use mooring::models::proxy::{RouteProtocol, RouteRequest, RouteStatus};
use mooring::proxy::labels::host_rule;
use mooring::proxy::service::ProxyConfigurator;
use mooring::store::catalog::Store;

fn request(name: &str, hostnames: &[&str]) -> RouteRequest {
    RouteRequest {
        name: name.to_string(),
        service_name: "Web App".to_string(),
        container_id: None,
        hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
        target_url: "http://web-app-1:3000".to_string(),
        port: 3000,
        protocol: RouteProtocol::Http,
        path_prefix: None,
        strip_prefix: false,
        tls: None,
        health_check: None,
        status: RouteStatus::Active,
    }
}

fn configurator(dir: &tempfile::TempDir) -> ProxyConfigurator {
    ProxyConfigurator::new(Arc::new(Store::in_memory()), dir.path())
}

async fn rendered(proxy: &ProxyConfigurator) -> serde_json::Value {
    proxy.config_file().read_json().await.unwrap()
}

#[test]
fn test_single_host_rule() {
    assert_eq!(host_rule(&["app.example.com"]), "Host(`app.example.com`)");
    assert_eq!(
        host_rule(&["a.example.com", "b.example.com"]),
        "Host(`a.example.com`) || Host(`b.example.com`)"
    );
}

#[tokio::test]
async fn test_create_route_writes_file_provider_config() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = configurator(&dir);

    let route = proxy
        .create_route(request("web", &["app.example.com"]))
        .await
        .unwrap();
    assert_eq!(
        proxy.config_file().path(),
        dir.path().join("dynamic").join("mooring.json")
    );

    let config = rendered(&proxy).await;
    let key = format!("web-app-{}", route.id);
    assert_eq!(
        config["http"]["routers"][&key]["rule"],
        "Host(`app.example.com`)"
    );
    assert_eq!(config["http"]["routers"][&key]["service"], key.as_str());
    assert_eq!(
        config["http"]["services"][&key]["loadBalancer"]["servers"][0]["url"],
        "http://web-app-1:3000"
    );
}

#[tokio::test]
async fn test_inactive_and_deleted_routes_are_not_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = configurator(&dir);

    let route = proxy
        .create_route(request("web", &["app.example.com"]))
        .await
        .unwrap();
    proxy.deactivate_route(&route.id).await.unwrap();
    let config = rendered(&proxy).await;
    assert!(config["http"]["routers"].as_object().unwrap().is_empty());

    proxy.activate_route(&route.id).await.unwrap();
    proxy.delete_route(&route.id).await.unwrap();
    let config = rendered(&proxy).await;
    assert!(config["http"]["routers"].as_object().unwrap().is_empty());
    assert!(proxy.list_routes().await.unwrap().is_empty());

    assert!(matches!(
        proxy.delete_route(&route.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_conflicting_hostname_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = configurator(&dir);

    proxy
        .create_route(request("web", &["app.example.com"]))
        .await
        .unwrap();
    let err = proxy
        .create_route(request("other", &["APP.example.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationError(_)));

    // same host under a different prefix is allowed
    let mut api = request("api", &["app.example.com"]);
    api.path_prefix = Some("/api".to_string());
    api.strip_prefix = true;
    let api = proxy.create_route(api).await.unwrap();

    let config = rendered(&proxy).await;
    let key = format!("web-app-{}", api.id);
    assert_eq!(
        config["http"]["routers"][&key]["rule"],
        "Host(`app.example.com`) && PathPrefix(`/api`)"
    );
    let strip = format!("{}-strip", key);
    assert_eq!(
        config["http"]["middlewares"][&strip]["stripPrefix"]["prefixes"][0],
        "/api"
    );
}

#[tokio::test]
async fn test_update_revalidates() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = configurator(&dir);
    let route = proxy
        .create_route(request("web", &["app.example.com"]))
        .await
        .unwrap();

    let mut bad = request("web", &["app.example.com"]);
    bad.target_url = "ftp://files".to_string();
    assert!(matches!(
        proxy.update_route(&route.id, bad).await,
        Err(EngineError::ValidationError(_))
    ));

    let updated = proxy
        .update_route(&route.id, request("web", &["www.example.com"]))
        .await
        .unwrap();
    assert_eq!(updated.hostnames, vec!["www.example.com".to_string()]);
    assert_eq!(updated.created_at, route.created_at);
}

//! Deployment orchestration tests

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;

use mooring::build::service::BuildExecutor;
use mooring::build::types::{BuildpackConfig, DockerfileConfig};
use mooring::containers::mock::MockContainerManager;
use mooring::deploy::executor::DeploymentExecutor;
use mooring::deploy::service::DeploymentService;
use mooring::errors::EngineError;
use mooring::models::application::{Application, DeploymentSource, PortMapping};
use mooring::models::deployment::{CreateDeployment, DeploymentStatus};
use mooring::storage::settings::{BuilderSettings, ProxySettings};
use mooring::store::catalog::Store;
use mooring::store::repository::ApplicationRepository;

struct Harness {
    mock: Arc<MockContainerManager>,
    applications: Arc<dyn ApplicationRepository>,
    executor: DeploymentExecutor,
}

fn harness() -> Harness {
    let store = Arc::new(Store::in_memory());
    let mock = Arc::new(MockContainerManager::new());
    let deployments = Arc::new(DeploymentService::new(store.clone(), mock.clone()));
    let builder = Arc::new(BuildExecutor::new(
        mock.clone(),
        BuilderSettings::default(),
        "/var/run/docker.sock",
    ));
    let executor = DeploymentExecutor::new(
        deployments,
        store.clone(),
        builder,
        mock.clone(),
        ProxySettings::default(),
    );
    Harness {
        mock,
        applications: store,
        executor,
    }
}

fn application(id: &str, source: DeploymentSource) -> Application {
    let now = Utc::now();
    Application {
        id: id.to_string(),
        name: "Shop Front".to_string(),
        source,
        domain: Some("shop.example.com".to_string()),
        generated_domain: None,
        exposed_ports: vec![3000],
        port_mappings: vec![PortMapping {
            container_port: 3000,
            host_port: Some(8080),
            protocol: "tcp".to_string(),
        }],
        buildpack: BuildpackConfig::Dockerfile(DockerfileConfig::default()),
        env_vars: BTreeMap::from([("PORT".to_string(), "3000".to_string())]),
        volumes: BTreeMap::new(),
        created_at: now,
        updated_at: now,
    }
}

fn git_source() -> DeploymentSource {
    DeploymentSource::Git {
        url: "https://example.com/acme/shop.git".to_string(),
        branch: Some("main".to_string()),
        path: None,
    }
}

fn create_cmd(application_id: &str) -> CreateDeployment {
    CreateDeployment {
        application_id: application_id.to_string(),
        ..Default::default()
    }
}

async fn deploy(h: &Harness, application_id: &str) -> String {
    let (deployment, task) = h
        .executor
        .create_and_execute(create_cmd(application_id))
        .await
        .unwrap();
    task.await.unwrap();
    deployment.id
}

#[tokio::test]
async fn test_numbering_increases_per_application() {
    let h = harness();
    let deployments = h.executor.deployments();

    let first = deployments.create(create_cmd("app-a")).await.unwrap();
    let second = deployments.create(create_cmd("app-a")).await.unwrap();
    let other = deployments.create(create_cmd("app-b")).await.unwrap();

    assert_eq!(first.deployment_number, 1);
    assert_eq!(second.deployment_number, 2);
    assert_eq!(other.deployment_number, 1);
    assert_eq!(second.image_tag, "mooring/app-a:2");
    assert!(matches!(
        deployments.create(create_cmd(" ")).await,
        Err(EngineError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_successful_deployment_runs_container() {
    let h = harness();
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();

    let id = deploy(&h, "shop").await;
    let d = h.executor.deployments().get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Running, "{}", d.deploy_logs);
    assert_eq!(d.image_digest.as_deref(), Some("mooring/shop:1"));
    assert!(d.build_completed_at.is_some());
    assert!(d.deploy_completed_at.is_some());
    assert!(d.error_message.is_none());

    let container_id = d.container_id.clone().unwrap();
    assert!(h.mock.contains(&container_id).await);
    assert!(d.deploy_logs.contains("Configured 1 port mapping(s)"));
    assert!(d.deploy_logs.contains("Creating container: shop-front-1"));
    assert!(d
        .deploy_logs
        .contains(&format!("Container created with ID: {}", container_id)));
    assert!(d
        .deploy_logs
        .ends_with("Container deployment completed successfully\n"));

    let created = h.mock.created().await;
    let workload = created.last().unwrap();
    assert_eq!(workload.image, "mooring/shop:1");
    assert_eq!(workload.ports.get("3000").map(String::as_str), Some("8080"));
    assert_eq!(workload.restart_policy.as_deref(), Some("unless-stopped"));
    assert_eq!(
        workload
            .labels
            .get("traefik.http.routers.shop-front-1.rule")
            .map(String::as_str),
        Some("Host(`shop.example.com`)")
    );
}

#[tokio::test]
async fn test_unknown_application_is_rejected() {
    let h = harness();
    assert!(matches!(
        h.executor.create_and_execute(create_cmd("ghost")).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_registry_source_fails_deployment() {
    let h = harness();
    h.applications
        .save(&application(
            "reg",
            DeploymentSource::Registry {
                image: "nginx".to_string(),
                tag: None,
            },
        ))
        .await
        .unwrap();

    let id = deploy(&h, "reg").await;
    let d = h.executor.deployments().get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert!(d
        .error_message
        .unwrap()
        .contains("registry deployments don't require building"));
    assert!(h.mock.created().await.is_empty());
}

#[tokio::test]
async fn test_build_failure_marks_failed_with_logs() {
    let h = harness();
    h.mock.set_exit_code(1);
    h.mock.set_log_output("npm ERR! missing script\n").await;
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();

    let id = deploy(&h, "shop").await;
    let d = h.executor.deployments().get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert_eq!(d.error_message.as_deref(), Some("build failed with exit code 1"));
    assert_eq!(
        d.build_logs,
        "npm ERR! missing script\n\nBuild failed: build failed with exit code 1\n"
    );
    assert!(d.container_id.is_none());
}

#[tokio::test]
async fn test_helper_create_failure_marks_failed() {
    let h = harness();
    h.mock.fail_create.store(true, Ordering::SeqCst);
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();

    let id = deploy(&h, "shop").await;
    let d = h.executor.deployments().get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert!(d.build_logs.contains("Build error:"));
}

#[tokio::test]
async fn test_container_start_failure_keeps_container_id() {
    let h = harness();
    h.mock.fail_start_for("shop-front").await;
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();

    let id = deploy(&h, "shop").await;
    let d = h.executor.deployments().get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert!(d.container_id.is_some());
    assert!(d.deploy_logs.contains("Deployment failed:"));
}

#[tokio::test]
async fn test_delete_is_best_effort() {
    let h = harness();
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();
    let id = deploy(&h, "shop").await;
    let container_id = h
        .executor
        .deployments()
        .get(&id)
        .await
        .unwrap()
        .container_id
        .unwrap();

    h.mock.fail_stop.store(true, Ordering::SeqCst);
    h.mock.fail_delete.store(true, Ordering::SeqCst);
    h.executor.deployments().delete_deployment(&id).await.unwrap();

    assert!(h.mock.stopped().await.contains(&container_id));
    assert!(h.mock.deleted().await.contains(&container_id));
    assert!(matches!(
        h.executor.deployments().get(&id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_recreate_replaces_container() {
    let h = harness();
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();
    let id = deploy(&h, "shop").await;
    let old = h
        .executor
        .deployments()
        .get(&id)
        .await
        .unwrap()
        .container_id
        .unwrap();
    let builds = h.mock.pulled().await.len();

    let d = h.executor.recreate_container("shop").await.unwrap();
    let new = d.container_id.clone().unwrap();
    assert_ne!(old, new);
    assert_eq!(d.status, DeploymentStatus::Running);
    assert!(!h.mock.contains(&old).await);
    assert!(h.mock.contains(&new).await);
    // no rebuild
    assert_eq!(h.mock.pulled().await.len(), builds);
}

#[tokio::test]
async fn test_recreate_requires_running_deployment() {
    let h = harness();
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();
    h.executor
        .deployments()
        .create(create_cmd("shop"))
        .await
        .unwrap();

    assert!(matches!(
        h.executor.recreate_container("shop").await,
        Err(EngineError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_concurrency_limit_still_completes() {
    let mut h = harness();
    h.executor = h.executor.clone().with_concurrency_limit(1);
    h.applications
        .save(&application("shop", git_source()))
        .await
        .unwrap();

    let (a, task_a) = h.executor.create_and_execute(create_cmd("shop")).await.unwrap();
    let (b, task_b) = h.executor.create_and_execute(create_cmd("shop")).await.unwrap();
    task_a.await.unwrap();
    task_b.await.unwrap();

    for id in [a.id, b.id] {
        let d = h.executor.deployments().get(&id).await.unwrap();
        assert_eq!(d.status, DeploymentStatus::Running);
    }
}

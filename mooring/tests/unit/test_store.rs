//! Record store persistence tests

use std::sync::Arc;

use mooring::errors::EngineError;
use mooring::models::deployment::{CreateDeployment, DeploymentStatus};
use mooring::storage::layout::StorageLayout;
use mooring::store::catalog::Store;
use mooring::store::repository::DeploymentRepository;
use mooring::containers::mock::MockContainerManager;
use mooring::deploy::service::DeploymentService;

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    let id = {
        let store = Arc::new(Store::open(&layout).await.unwrap());
        let deployments = DeploymentService::new(store, Arc::new(MockContainerManager::new()));
        let d = deployments
            .create(CreateDeployment {
                application_id: "app".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        deployments.start_build(&d.id).await.unwrap();
        deployments.append_build_logs(&d.id, "cloning\n").await.unwrap();
        d.id
    };
    assert!(layout.deployments_file().exists().await);

    let reopened: Arc<dyn DeploymentRepository> = Arc::new(Store::open(&layout).await.unwrap());
    let d = reopened.get(&id).await.unwrap().unwrap();
    assert_eq!(d.status, DeploymentStatus::Building);
    assert_eq!(d.build_logs, "cloning\n");
    assert_eq!(
        reopened
            .latest_by_application("app")
            .await
            .unwrap()
            .map(|d| d.deployment_number),
        Some(1)
    );
}

#[tokio::test]
async fn test_delete_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    let store: Arc<dyn DeploymentRepository> = Arc::new(Store::open(&layout).await.unwrap());
    let deployments = DeploymentService::new(store.clone(), Arc::new(MockContainerManager::new()));
    let d = deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(store.delete(&d.id).await.unwrap());
    assert!(!store.delete(&d.id).await.unwrap());

    let reopened: Arc<dyn DeploymentRepository> = Arc::new(Store::open(&layout).await.unwrap());
    assert!(reopened.get(&d.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_file_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    layout.setup().await.unwrap();
    layout
        .deployments_file()
        .write_atomic(b"{ not json")
        .await
        .unwrap();

    assert!(matches!(
        Store::open(&layout).await,
        Err(EngineError::StorageError(_))
    ));
}

#[tokio::test]
async fn test_failed_flush_leaves_record_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    let store: Arc<dyn DeploymentRepository> = Arc::new(Store::open(&layout).await.unwrap());
    let deployments = DeploymentService::new(store.clone(), Arc::new(MockContainerManager::new()));
    let d = deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    // the records directory turns into a plain file, so every write fails
    let records = layout.records_dir();
    std::fs::remove_dir_all(records.path()).unwrap();
    std::fs::write(records.path(), b"").unwrap();

    assert!(matches!(
        deployments.start_build(&d.id).await,
        Err(EngineError::StorageError(_))
    ));
    assert_eq!(
        deployments.get(&d.id).await.unwrap().status,
        DeploymentStatus::Pending
    );

    assert!(store.delete(&d.id).await.is_err());
    assert!(store.get(&d.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_logs_are_kept_out_of_the_record_file() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    let store: Arc<dyn DeploymentRepository> = Arc::new(Store::open(&layout).await.unwrap());
    let deployments = DeploymentService::new(store.clone(), Arc::new(MockContainerManager::new()));
    let d = deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let record_file_before = layout.deployments_file().read_string().await.unwrap();

    for _ in 0..50 {
        deployments.append_build_logs(&d.id, "step output\n").await.unwrap();
    }
    deployments.append_deploy_logs(&d.id, "Starting container...").await.unwrap();

    // appends do not rewrite the record file
    assert_eq!(
        layout.deployments_file().read_string().await.unwrap(),
        record_file_before
    );
    assert!(!record_file_before.contains("step output"));

    let d = deployments.get(&d.id).await.unwrap();
    assert_eq!(d.build_logs, "step output\n".repeat(50));
    assert_eq!(d.deploy_logs, "Starting container...\n");

    // transitions keep the logs
    deployments.start_build(&d.id).await.unwrap();
    assert_eq!(deployments.get(&d.id).await.unwrap().build_logs.len(), d.build_logs.len());

    assert!(matches!(
        deployments.append_build_logs("missing", "x").await,
        Err(EngineError::NotFound(_))
    ));

    assert!(store.delete(&d.id).await.unwrap());
    assert!(!layout
        .deployment_logs_dir()
        .file(&format!("{}.build.log", d.id))
        .exists()
        .await);
}

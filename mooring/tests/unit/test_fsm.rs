//! Deployment state machine tests

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use mooring::containers::mock::MockContainerManager;
use mooring::deploy::fsm::{next_status, DeploymentEvent};
use mooring::deploy::service::DeploymentService;
use mooring::errors::EngineError;
use mooring::models::deployment::{CreateDeployment, DeploymentStatus};
use mooring::store::catalog::Store;

fn service() -> DeploymentService {
    DeploymentService::new(
        Arc::new(Store::in_memory()),
        Arc::new(MockContainerManager::new()),
    )
}

fn create_cmd(application_id: &str) -> CreateDeployment {
    CreateDeployment {
        application_id: application_id.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_lifecycle_stamps_timestamps() {
    let deployments = service();
    let d = deployments.create(create_cmd("app")).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Pending);

    let d = assert_ok!(deployments.start_build(&d.id).await);
    assert!(d.build_started_at.is_some());
    let d = assert_ok!(deployments.complete_build(&d.id).await);
    assert!(d.build_completed_at.is_some());
    let d = assert_ok!(deployments.start_deploy(&d.id).await);
    assert!(d.deploy_started_at.is_some());
    let d = assert_ok!(deployments.complete_deploy(&d.id).await);
    assert_eq!(d.status, DeploymentStatus::Running);
    assert!(d.deploy_completed_at.is_some());
    assert!(d.build_duration_secs().unwrap() >= 0);

    let d = deployments.stop(&d.id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Stopped);
    assert!(d.stopped_at.is_some());
}

#[tokio::test]
async fn test_rejected_transition_leaves_record_unchanged() {
    let deployments = service();
    let d = deployments.create(create_cmd("app")).await.unwrap();

    let err = deployments.complete_deploy(&d.id).await.unwrap_err();
    assert!(matches!(err, EngineError::TransitionError(_)));

    let stored = deployments.get(&d.id).await.unwrap();
    assert_eq!(stored.status, DeploymentStatus::Pending);
    assert!(stored.deploy_completed_at.is_none());
    assert_eq!(stored.updated_at, d.updated_at);
}

#[tokio::test]
async fn test_fail_records_message() {
    let deployments = service();
    let d = deployments.create(create_cmd("app")).await.unwrap();
    deployments.start_build(&d.id).await.unwrap();

    let d = deployments.fail(&d.id, "clone failed").await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Failed);
    assert_eq!(d.error_message.as_deref(), Some("clone failed"));

    // Failed is terminal
    assert_err!(deployments.fail(&d.id, "again").await);
    assert_err!(deployments.start_build(&d.id).await);
}

#[tokio::test]
async fn test_cancel_only_before_build_completes() {
    let deployments = service();

    let pending = deployments.create(create_cmd("app")).await.unwrap();
    let cancelled = deployments.cancel(&pending.id).await.unwrap();
    assert_eq!(cancelled.status, DeploymentStatus::Cancelled);

    let built = deployments.create(create_cmd("app")).await.unwrap();
    deployments.start_build(&built.id).await.unwrap();
    deployments.complete_build(&built.id).await.unwrap();
    assert!(matches!(
        deployments.cancel(&built.id).await,
        Err(EngineError::TransitionError(_))
    ));
}

#[tokio::test]
async fn test_stop_requires_running() {
    let deployments = service();
    let d = deployments.create(create_cmd("app")).await.unwrap();
    assert!(matches!(
        deployments.stop(&d.id).await,
        Err(EngineError::TransitionError(_))
    ));
}

#[tokio::test]
async fn test_unknown_deployment_is_not_found() {
    let deployments = service();
    assert!(matches!(
        deployments.start_build("missing").await,
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn test_fail_legal_from_every_in_flight_status() {
    for status in [
        DeploymentStatus::Pending,
        DeploymentStatus::Building,
        DeploymentStatus::BuildComplete,
        DeploymentStatus::Deploying,
    ] {
        assert_eq!(
            next_status(status, &DeploymentEvent::Fail("x".into())),
            Some(DeploymentStatus::Failed)
        );
    }
    assert_eq!(
        next_status(DeploymentStatus::Running, &DeploymentEvent::Fail("x".into())),
        None
    );
}

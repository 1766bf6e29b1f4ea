//! Status reconciliation tests

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mooring::containers::mock::MockContainerManager;
use mooring::database::service::DatabaseService;
use mooring::deploy::service::DeploymentService;
use mooring::models::database::{DatabaseEngine, DatabaseStatus, KeyValueConfig};
use mooring::models::deployment::{CreateDeployment, DeploymentStatus};
use mooring::reconcile::targets::{DatabaseTarget, DeploymentTarget};
use mooring::reconcile::{Reconcile, Reconciler, TickReport};
use mooring::store::catalog::Store;
use mooring::workers::reconciler;

struct Harness {
    mock: Arc<MockContainerManager>,
    deployments: Arc<DeploymentService>,
    databases: Arc<DatabaseService>,
}

fn harness() -> Harness {
    let store = Arc::new(Store::in_memory());
    let mock = Arc::new(MockContainerManager::new());
    Harness {
        deployments: Arc::new(DeploymentService::new(store.clone(), mock.clone())),
        databases: Arc::new(DatabaseService::new(store, mock.clone())),
        mock,
    }
}

impl Harness {
    fn deployment_reconciler(&self) -> Reconciler<DeploymentTarget> {
        Reconciler::new(DeploymentTarget::new(self.deployments.clone()), self.mock.clone())
    }

    fn database_reconciler(&self) -> Reconciler<DatabaseTarget> {
        Reconciler::new(DatabaseTarget::new(self.databases.clone()), self.mock.clone())
    }

    /// A running deployment backed by container `container_id`
    async fn running_deployment(&self, container_id: &str) -> String {
        let d = self
            .deployments
            .create(CreateDeployment {
                application_id: "app".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        self.deployments.start_build(&d.id).await.unwrap();
        self.deployments.complete_build(&d.id).await.unwrap();
        self.deployments.start_deploy(&d.id).await.unwrap();
        self.deployments
            .set_container_id(&d.id, container_id)
            .await
            .unwrap();
        self.deployments.complete_deploy(&d.id).await.unwrap();
        d.id
    }
}

#[tokio::test]
async fn test_exited_container_stops_deployment() {
    let h = harness();
    h.mock.insert_container("c1", "exited", "Exited (137) 1 minute ago").await;
    let id = h.running_deployment("c1").await;

    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(
        report,
        TickReport {
            checked: 1,
            updated: 1,
            errors: 0
        }
    );
    let d = h.deployments.get(&id).await.unwrap();
    assert_eq!(d.status, DeploymentStatus::Stopped);
    assert!(d.stopped_at.is_some());
}

#[tokio::test]
async fn test_second_tick_is_idempotent() {
    let h = harness();
    h.mock.insert_container("c1", "exited", "Exited (0)").await;
    let id = h.running_deployment("c1").await;
    let reconciler = h.deployment_reconciler();

    assert_eq!(reconciler.tick().await.unwrap().updated, 1);
    let after_first = h.deployments.get(&id).await.unwrap();

    // stopped records are no longer tracked
    let second = reconciler.tick().await.unwrap();
    assert_eq!(second.checked, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(h.deployments.get(&id).await.unwrap(), after_first);
}

#[tokio::test]
async fn test_missing_container_yields_one_update() {
    let h = harness();
    let id = h.running_deployment("gone").await;
    let reconciler = h.deployment_reconciler();

    assert_eq!(reconciler.tick().await.unwrap().updated, 1);
    assert_eq!(reconciler.tick().await.unwrap().updated, 0);
    assert_eq!(
        h.deployments.get(&id).await.unwrap().status,
        DeploymentStatus::Stopped
    );
}

#[tokio::test]
async fn test_explicit_stop_survives_running_container() {
    let h = harness();
    h.mock.insert_container("c1", "running", "Up 5 minutes").await;
    let id = h.running_deployment("c1").await;
    h.deployments.stop(&id).await.unwrap();

    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(report, TickReport::default());
    assert_eq!(
        h.deployments.get(&id).await.unwrap().status,
        DeploymentStatus::Stopped
    );
}

#[tokio::test]
async fn test_restarted_container_leaves_stopped_record() {
    let h = harness();
    h.mock.insert_container("c1", "exited", "Exited (0)").await;
    let id = h.running_deployment("c1").await;
    let reconciler = h.deployment_reconciler();
    assert_eq!(reconciler.tick().await.unwrap().updated, 1);

    h.mock.set_state("c1", "running", "Up 2 seconds").await;
    assert_eq!(reconciler.tick().await.unwrap().updated, 0);
    assert_eq!(
        h.deployments.get(&id).await.unwrap().status,
        DeploymentStatus::Stopped
    );
}

#[tokio::test]
async fn test_failed_deployment_is_never_revived() {
    let h = harness();
    h.mock.insert_container("c1", "running", "Up").await;
    let d = h
        .deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    h.deployments.start_build(&d.id).await.unwrap();
    h.deployments.complete_build(&d.id).await.unwrap();
    h.deployments.start_deploy(&d.id).await.unwrap();
    h.deployments.set_container_id(&d.id, "c1").await.unwrap();
    h.deployments.fail(&d.id, "health check failed").await.unwrap();

    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(
        h.deployments.get(&d.id).await.unwrap().status,
        DeploymentStatus::Failed
    );
}

#[tokio::test]
async fn test_deploying_record_is_left_to_its_task() {
    let h = harness();
    h.mock.insert_container("c1", "running", "Up 1 second").await;
    let d = h
        .deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    h.deployments.start_build(&d.id).await.unwrap();
    h.deployments.complete_build(&d.id).await.unwrap();
    h.deployments.start_deploy(&d.id).await.unwrap();
    h.deployments.set_container_id(&d.id, "c1").await.unwrap();

    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(h.mock.inspect_calls(), 0);
    assert_eq!(
        h.deployments.get(&d.id).await.unwrap().status,
        DeploymentStatus::Deploying
    );

    // once the task completes the record is tracked
    h.deployments.complete_deploy(&d.id).await.unwrap();
    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn test_inflight_deployments_are_not_tracked() {
    let h = harness();
    let d = h
        .deployments
        .create(CreateDeployment {
            application_id: "app".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    h.deployments.start_build(&d.id).await.unwrap();

    let report = h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(h.mock.inspect_calls(), 0);
}

#[tokio::test]
async fn test_inspect_error_counts_as_stopped() {
    let h = harness();
    h.mock.insert_container("c1", "running", "Up").await;
    let id = h.running_deployment("c1").await;
    h.mock.fail_inspect.store(true, Ordering::SeqCst);

    h.deployment_reconciler().tick().await.unwrap();
    assert_eq!(
        h.deployments.get(&id).await.unwrap().status,
        DeploymentStatus::Stopped
    );
}

#[tokio::test]
async fn test_database_drift_is_corrected() {
    let h = harness();
    let db = h
        .databases
        .create(
            "sessions",
            "proj",
            "prod",
            DatabaseEngine::Redis(KeyValueConfig {
                version: None,
                port: 6379,
                password: Some("s3cret".to_string()),
                environment: BTreeMap::new(),
            }),
        )
        .await
        .unwrap();
    let db = h.databases.deploy(&db.id).await.unwrap();
    let container_id = db.container_id.clone().unwrap();

    h.mock.set_state(&container_id, "dead", "Dead").await;
    let report = h.database_reconciler().tick().await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(
        h.databases.get(&db.id).await.unwrap().status,
        DatabaseStatus::Failed
    );
}

#[tokio::test]
async fn test_database_being_deleted_is_skipped() {
    let h = harness();
    let db = h
        .databases
        .create(
            "cache",
            "proj",
            "prod",
            DatabaseEngine::Redis(KeyValueConfig {
                version: None,
                port: 6379,
                password: None,
                environment: BTreeMap::new(),
            }),
        )
        .await
        .unwrap();
    let db = h.databases.deploy(&db.id).await.unwrap();
    let container_id = db.container_id.clone().unwrap();
    h.databases
        .set_observed_status(&db.id, DatabaseStatus::Deleting)
        .await
        .unwrap();
    h.mock.set_state(&container_id, "exited", "Exited (0)").await;

    let report = h.database_reconciler().tick().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(
        h.databases.get(&db.id).await.unwrap().status,
        DatabaseStatus::Deleting
    );
}

#[tokio::test]
async fn test_worker_stops_on_shutdown() {
    let h = harness();
    h.mock.insert_container("c1", "exited", "Exited (0)").await;
    let id = h.running_deployment("c1").await;
    let reconcilers: Vec<Arc<dyn Reconcile>> = vec![Arc::new(h.deployment_reconciler())];

    let options = reconciler::Options {
        interval: Duration::from_secs(3600),
    };
    reconciler::run(
        &options,
        reconcilers,
        tokio::time::sleep,
        Box::pin(async {}),
    )
    .await;

    // the first pass runs before the shutdown signal is observed
    assert_eq!(
        h.deployments.get(&id).await.unwrap().status,
        DeploymentStatus::Stopped
    );
}

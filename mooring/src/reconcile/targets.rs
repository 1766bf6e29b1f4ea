//! Reconciliation adapters for deployments and database instances

use std::sync::Arc;

use async_trait::async_trait;

use crate::database::service::DatabaseService;
use crate::deploy::service::DeploymentService;
use crate::errors::EngineError;
use crate::models::database::DatabaseStatus;
use crate::models::deployment::DeploymentStatus;
use crate::reconcile::{ObservedState, ReconcileTarget, Tracked};

/// `Running` deployments with a container. In-flight deployments belong to
/// their orchestration task, and terminal ones are never moved again.
pub struct DeploymentTarget {
    deployments: Arc<DeploymentService>,
}

impl DeploymentTarget {
    pub fn new(deployments: Arc<DeploymentService>) -> Self {
        Self { deployments }
    }
}

#[async_trait]
impl ReconcileTarget for DeploymentTarget {
    type Status = DeploymentStatus;

    fn kind(&self) -> &'static str {
        "deployment"
    }

    async fn tracked(&self) -> Result<Vec<Tracked<DeploymentStatus>>, EngineError> {
        Ok(self
            .deployments
            .list_by_status(DeploymentStatus::Running)
            .await?
            .into_iter()
            .filter_map(|deployment| {
                let container_id = deployment.container_id.filter(|c| !c.is_empty())?;
                Some(Tracked {
                    id: deployment.id,
                    container_id,
                    status: deployment.status,
                })
            })
            .collect())
    }

    fn desired(&self, observed: ObservedState) -> Option<DeploymentStatus> {
        match observed {
            ObservedState::Running => Some(DeploymentStatus::Running),
            ObservedState::Stopped => Some(DeploymentStatus::Stopped),
            ObservedState::Provisioning => None,
            ObservedState::Failed => Some(DeploymentStatus::Failed),
        }
    }

    async fn write_status(&self, id: &str, status: DeploymentStatus) -> Result<(), EngineError> {
        self.deployments.set_observed_status(id, status).await?;
        Ok(())
    }
}

/// Database instances with a container, except those being deleted.
pub struct DatabaseTarget {
    databases: Arc<DatabaseService>,
}

impl DatabaseTarget {
    pub fn new(databases: Arc<DatabaseService>) -> Self {
        Self { databases }
    }
}

#[async_trait]
impl ReconcileTarget for DatabaseTarget {
    type Status = DatabaseStatus;

    fn kind(&self) -> &'static str {
        "database"
    }

    async fn tracked(&self) -> Result<Vec<Tracked<DatabaseStatus>>, EngineError> {
        Ok(self
            .databases
            .list_with_containers()
            .await?
            .into_iter()
            .filter(|db| db.status != DatabaseStatus::Deleting)
            .filter_map(|db| {
                let container_id = db.container_id?;
                Some(Tracked {
                    id: db.id,
                    container_id,
                    status: db.status,
                })
            })
            .collect())
    }

    fn desired(&self, observed: ObservedState) -> Option<DatabaseStatus> {
        Some(match observed {
            ObservedState::Running => DatabaseStatus::Running,
            ObservedState::Stopped => DatabaseStatus::Stopped,
            ObservedState::Provisioning => DatabaseStatus::Provisioning,
            ObservedState::Failed => DatabaseStatus::Failed,
        })
    }

    async fn write_status(&self, id: &str, status: DatabaseStatus) -> Result<(), EngineError> {
        self.databases.set_observed_status(id, status).await?;
        Ok(())
    }
}

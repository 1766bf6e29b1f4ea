//! Guarded operations on deployment records.
//!
//! Every operation loads the record, validates the transition, mutates and
//! saves it. A rejected transition writes nothing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::containers::manager::ContainerManager;
use crate::deploy::fsm::DeploymentEvent;
use crate::errors::EngineError;
use crate::models::deployment::{CreateDeployment, Deployment, DeploymentStatus};
use crate::store::repository::DeploymentRepository;
use crate::utils::generate_uuid;

/// Default image tag for a deployment
pub fn default_image_tag(application_id: &str, deployment_number: u32) -> String {
    format!("mooring/{}:{}", application_id.to_lowercase(), deployment_number)
}

pub struct DeploymentService {
    repo: Arc<dyn DeploymentRepository>,
    containers: Arc<dyn ContainerManager>,
}

impl DeploymentService {
    pub fn new(repo: Arc<dyn DeploymentRepository>, containers: Arc<dyn ContainerManager>) -> Self {
        Self { repo, containers }
    }

    /// Create a `Pending` deployment numbered after the application's latest.
    ///
    /// Concurrent creates for the same application can compute the same
    /// number; callers that need distinct numbers must serialize creation.
    pub async fn create(&self, cmd: CreateDeployment) -> Result<Deployment, EngineError> {
        if cmd.application_id.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "application_id must not be empty".to_string(),
            ));
        }

        let deployment_number = self
            .repo
            .latest_by_application(&cmd.application_id)
            .await?
            .map(|latest| latest.deployment_number + 1)
            .unwrap_or(1);

        let now = Utc::now();
        let image_tag = cmd
            .image_tag
            .filter(|tag| !tag.trim().is_empty())
            .unwrap_or_else(|| default_image_tag(&cmd.application_id, deployment_number));

        let deployment = Deployment {
            id: generate_uuid(),
            application_id: cmd.application_id,
            deployment_number,
            is_production: cmd.is_production,
            triggered_by: cmd.triggered_by,
            trigger_type: cmd.trigger_type,
            image_tag,
            git_commit_hash: cmd.git_commit_hash,
            git_commit_message: cmd.git_commit_message,
            git_branch: cmd.git_branch,
            git_author_name: cmd.git_author_name,
            status: DeploymentStatus::Pending,
            container_id: None,
            image_digest: None,
            build_logs: String::new(),
            deploy_logs: String::new(),
            error_message: None,
            build_started_at: None,
            build_completed_at: None,
            deploy_started_at: None,
            deploy_completed_at: None,
            stopped_at: None,
            created_at: now,
            updated_at: now,
        };

        self.repo.save(&deployment).await?;
        info!(
            deployment_id = %deployment.id,
            application_id = %deployment.application_id,
            deployment_number = deployment.deployment_number,
            "Created deployment"
        );
        Ok(deployment)
    }

    pub async fn get(&self, id: &str) -> Result<Deployment, EngineError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("deployment {}", id)))
    }

    pub async fn list(&self) -> Result<Vec<Deployment>, EngineError> {
        self.repo.list().await
    }

    pub async fn list_by_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<Deployment>, EngineError> {
        self.repo.list_by_application(application_id).await
    }

    pub async fn latest_by_application(
        &self,
        application_id: &str,
    ) -> Result<Option<Deployment>, EngineError> {
        self.repo.latest_by_application(application_id).await
    }

    pub async fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, EngineError> {
        self.repo.list_by_status(status).await
    }

    async fn transition(&self, id: &str, event: DeploymentEvent) -> Result<Deployment, EngineError> {
        let mut deployment = self.get(id).await?;
        let from = deployment.status;
        deployment.process(event)?;
        self.repo.save(&deployment).await?;
        info!(
            deployment_id = %id,
            from = %from,
            to = %deployment.status,
            "Deployment transitioned"
        );
        Ok(deployment)
    }

    pub async fn start_build(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::StartBuild).await
    }

    pub async fn complete_build(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::CompleteBuild).await
    }

    pub async fn start_deploy(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::StartDeploy).await
    }

    pub async fn complete_deploy(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::CompleteDeploy).await
    }

    pub async fn fail(&self, id: &str, message: impl Into<String>) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::Fail(message.into())).await
    }

    /// Marks the record cancelled. A build already in flight keeps running.
    pub async fn cancel(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::Cancel).await
    }

    /// Marks the record stopped. The container is not signalled.
    pub async fn stop(&self, id: &str) -> Result<Deployment, EngineError> {
        self.transition(id, DeploymentEvent::Stop).await
    }

    async fn update<F>(&self, id: &str, mutate: F) -> Result<Deployment, EngineError>
    where
        F: FnOnce(&mut Deployment),
    {
        let mut deployment = self.get(id).await?;
        mutate(&mut deployment);
        deployment.updated_at = Utc::now();
        self.repo.save(&deployment).await?;
        Ok(deployment)
    }

    pub async fn set_container_id(&self, id: &str, container_id: &str) -> Result<Deployment, EngineError> {
        self.update(id, |d| d.container_id = Some(container_id.to_string()))
            .await
    }

    pub async fn set_image_digest(&self, id: &str, digest: &str) -> Result<Deployment, EngineError> {
        self.update(id, |d| d.image_digest = Some(digest.to_string()))
            .await
    }

    /// Appends to the build log. The record itself is not rewritten.
    pub async fn append_build_logs(&self, id: &str, logs: &str) -> Result<(), EngineError> {
        self.repo.append_build_logs(id, logs).await
    }

    /// Appends one line to the deploy log.
    pub async fn append_deploy_logs(&self, id: &str, line: &str) -> Result<(), EngineError> {
        if line.ends_with('\n') {
            self.repo.append_deploy_logs(id, line).await
        } else {
            self.repo.append_deploy_logs(id, &format!("{}\n", line)).await
        }
    }

    /// Status written by reconciliation, bypassing the transition guards.
    pub async fn set_observed_status(
        &self,
        id: &str,
        status: DeploymentStatus,
    ) -> Result<Deployment, EngineError> {
        self.update(id, |d| {
            if status == DeploymentStatus::Stopped && d.stopped_at.is_none() {
                d.stopped_at = Some(Utc::now());
            }
            d.status = status;
        })
        .await
    }

    /// Remove the record, first stopping and deleting its container on a
    /// best-effort basis.
    pub async fn delete_deployment(&self, id: &str) -> Result<(), EngineError> {
        let deployment = self.get(id).await?;

        if let Some(container_id) = deployment.container_id.as_deref().filter(|c| !c.is_empty()) {
            if let Err(e) = self.containers.stop(container_id).await {
                warn!(deployment_id = %id, container_id, "Failed to stop container: {}", e);
            }
            if let Err(e) = self.containers.delete(container_id).await {
                warn!(deployment_id = %id, container_id, "Failed to delete container: {}", e);
            }
        }

        self.repo.delete(id).await?;
        info!(deployment_id = %id, "Deleted deployment");
        Ok(())
    }
}

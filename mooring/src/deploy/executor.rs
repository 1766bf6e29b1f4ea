//! Deployment orchestration: build the image, then run the workload

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::build::service::BuildExecutor;
use crate::build::types::{BuildSpec, LogSink};
use crate::containers::manager::ContainerManager;
use crate::deploy::service::DeploymentService;
use crate::deploy::workload::application_workload;
use crate::errors::EngineError;
use crate::models::application::{Application, DeploymentSource};
use crate::models::deployment::{CreateDeployment, Deployment, DeploymentStatus};
use crate::storage::settings::ProxySettings;
use crate::store::repository::ApplicationRepository;

/// Runs deployments on detached tasks.
///
/// A launched task outlives the request that created it and is not stopped by
/// `cancel`, `stop` or server shutdown.
#[derive(Clone)]
pub struct DeploymentExecutor {
    deployments: Arc<DeploymentService>,
    applications: Arc<dyn ApplicationRepository>,
    builder: Arc<BuildExecutor>,
    containers: Arc<dyn ContainerManager>,
    proxy: ProxySettings,
    limit: Option<Arc<Semaphore>>,
}

impl DeploymentExecutor {
    pub fn new(
        deployments: Arc<DeploymentService>,
        applications: Arc<dyn ApplicationRepository>,
        builder: Arc<BuildExecutor>,
        containers: Arc<dyn ContainerManager>,
        proxy: ProxySettings,
    ) -> Self {
        Self {
            deployments,
            applications,
            builder,
            containers,
            proxy,
            limit: None,
        }
    }

    /// Run at most `max` deployments at once; the rest wait for a slot.
    pub fn with_concurrency_limit(mut self, max: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn deployments(&self) -> &Arc<DeploymentService> {
        &self.deployments
    }

    /// Create the deployment record and run it in the background.
    ///
    /// Dropping the returned handle does not abort the task.
    pub async fn create_and_execute(
        &self,
        cmd: CreateDeployment,
    ) -> Result<(Deployment, JoinHandle<()>), EngineError> {
        if self.applications.get(&cmd.application_id).await?.is_none() {
            return Err(EngineError::NotFound(format!(
                "application {}",
                cmd.application_id
            )));
        }

        let deployment = self.deployments.create(cmd).await?;

        let executor = self.clone();
        let deployment_id = deployment.id.clone();
        let task = tokio::spawn(async move {
            let _permit = match &executor.limit {
                Some(limit) => match limit.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        warn!(deployment_id = %deployment_id, "Concurrency limit unavailable: {}", e);
                        None
                    }
                },
                None => None,
            };

            if let Err(e) = executor.execute(&deployment_id).await {
                error!(deployment_id = %deployment_id, "Deployment did not complete: {}", e);
            }
        });

        Ok((deployment, task))
    }

    /// Build and deploy a `Pending` deployment.
    ///
    /// Build and container failures end with the deployment marked failed and
    /// `Ok(())`. Errors are returned only when the record itself cannot be
    /// advanced.
    pub async fn execute(&self, deployment_id: &str) -> Result<(), EngineError> {
        let deployment = self.deployments.start_build(deployment_id).await?;

        let application = match self.applications.get(&deployment.application_id).await? {
            Some(application) => application,
            None => {
                let message = format!("application {} not found", deployment.application_id);
                self.deployments.fail(deployment_id, message).await?;
                return Ok(());
            }
        };

        let spec = match self.build_spec(&deployment, &application) {
            Ok(spec) => spec,
            Err(e) => {
                self.build_log(deployment_id, &format!("{}\n", e)).await;
                self.deployments.fail(deployment_id, e.to_string()).await?;
                return Ok(());
            }
        };

        let result = match self.builder.build_image(&spec).await {
            Ok(result) if result.success => result,
            Ok(result) => {
                let message = result
                    .error
                    .unwrap_or_else(|| "build failed".to_string());
                self.build_log(deployment_id, &format!("\nBuild failed: {}\n", message))
                    .await;
                self.deployments.fail(deployment_id, message).await?;
                return Ok(());
            }
            Err(e) => {
                self.build_log(deployment_id, &format!("\nBuild error: {}\n", e))
                    .await;
                self.deployments.fail(deployment_id, e.to_string()).await?;
                return Ok(());
            }
        };

        self.deployments.complete_build(deployment_id).await?;
        self.deployments.start_deploy(deployment_id).await?;
        self.deployments
            .set_image_digest(deployment_id, &result.image_tag)
            .await?;

        if let Err(e) = self
            .launch(&deployment, &application, &result.image_tag)
            .await
        {
            self.deploy_log(deployment_id, &format!("Deployment failed: {}", e))
                .await;
            self.deployments.fail(deployment_id, e.to_string()).await?;
            return Ok(());
        }

        self.deployments.complete_deploy(deployment_id).await?;
        self.deploy_log(deployment_id, "Container deployment completed successfully")
            .await;
        info!(
            deployment_id = %deployment_id,
            application_id = %deployment.application_id,
            "Deployment running"
        );
        Ok(())
    }

    /// Replace the container of the application's running deployment with a
    /// fresh one from the same image. No rebuild happens.
    pub async fn recreate_container(&self, application_id: &str) -> Result<Deployment, EngineError> {
        let application = self
            .applications
            .get(application_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("application {}", application_id)))?;

        let deployment = self
            .deployments
            .latest_by_application(application_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("no deployments for application {}", application_id))
            })?;

        if deployment.status != DeploymentStatus::Running {
            return Err(EngineError::ValidationError(format!(
                "latest deployment {} is {}, not running",
                deployment.id, deployment.status
            )));
        }
        let old_container = deployment
            .container_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                EngineError::ValidationError(format!(
                    "deployment {} has no container",
                    deployment.id
                ))
            })?;

        info!(
            deployment_id = %deployment.id,
            container_id = %old_container,
            "Recreating container"
        );
        self.deploy_log(&deployment.id, "Recreating container...").await;
        self.containers.stop(&old_container).await?;
        self.containers.delete(&old_container).await?;

        let image_tag = deployment.image_tag.clone();
        self.launch(&deployment, &application, &image_tag).await?;
        self.deploy_log(&deployment.id, "Container recreated successfully")
            .await;
        self.deployments.get(&deployment.id).await
    }

    fn build_spec(
        &self,
        deployment: &Deployment,
        application: &Application,
    ) -> Result<BuildSpec, EngineError> {
        let (url, branch, path) = match &application.source {
            DeploymentSource::Git { url, branch, path } => (url, branch, path),
            DeploymentSource::Registry { .. } => {
                return Err(EngineError::ValidationError(
                    "registry deployments don't require building".to_string(),
                ))
            }
            DeploymentSource::Upload { .. } => {
                return Err(EngineError::ValidationError(
                    "upload deployments not yet implemented".to_string(),
                ))
            }
        };

        Ok(BuildSpec {
            id: deployment.id.clone(),
            git_repo: url.clone(),
            git_branch: deployment.git_branch.clone().or_else(|| branch.clone()),
            context_root: path.clone(),
            buildpack: application.buildpack.clone(),
            environment: application.env_vars.clone(),
            image_tag: deployment.image_tag.clone(),
            log_sink: Some(self.build_log_sink(&deployment.id)),
        })
    }

    fn build_log_sink(&self, deployment_id: &str) -> LogSink {
        let deployments = self.deployments.clone();
        let deployment_id = deployment_id.to_string();
        Arc::new(move |chunk: String| {
            let deployments = deployments.clone();
            let deployment_id = deployment_id.clone();
            async move {
                if let Err(e) = deployments.append_build_logs(&deployment_id, &chunk).await {
                    warn!(deployment_id = %deployment_id, "Failed to append build logs: {}", e);
                }
            }
            .boxed()
        })
    }

    /// Create and start the workload container, recording its id.
    async fn launch(
        &self,
        deployment: &Deployment,
        application: &Application,
        image_tag: &str,
    ) -> Result<String, EngineError> {
        let id = deployment.id.as_str();
        self.deploy_log(id, "Starting container deployment...").await;

        let workload = application_workload(
            application,
            deployment.deployment_number,
            image_tag,
            &self.proxy,
        );
        if workload.ports.is_empty() {
            self.deploy_log(
                id,
                "No port mappings configured - container will not expose ports to host",
            )
            .await;
        } else {
            self.deploy_log(
                id,
                &format!("Configured {} port mapping(s)", workload.ports.len()),
            )
            .await;
        }

        self.deploy_log(id, &format!("Creating container: {}", workload.name))
            .await;
        let container_id = self.containers.create(&workload).await?;
        self.deploy_log(id, &format!("Container created with ID: {}", container_id))
            .await;
        self.deployments.set_container_id(id, &container_id).await?;

        self.deploy_log(id, "Starting container...").await;
        self.containers.start(&container_id).await?;

        match self.containers.inspect(&container_id).await {
            Ok(info) => {
                self.deploy_log(
                    id,
                    &format!("Container state: {} ({})", info.state, info.status),
                )
                .await
            }
            Err(e) => {
                warn!(deployment_id = %id, container_id = %container_id, "Failed to inspect container: {}", e);
                self.deploy_log(id, &format!("Warning: could not inspect container: {}", e))
                    .await;
            }
        }

        debug!(deployment_id = %id, container_id = %container_id, "Container started");
        Ok(container_id)
    }

    async fn build_log(&self, deployment_id: &str, text: &str) {
        if let Err(e) = self.deployments.append_build_logs(deployment_id, text).await {
            warn!(deployment_id = %deployment_id, "Failed to append build logs: {}", e);
        }
    }

    async fn deploy_log(&self, deployment_id: &str, line: &str) {
        if let Err(e) = self.deployments.append_deploy_logs(deployment_id, line).await {
            warn!(deployment_id = %deployment_id, "Failed to append deploy logs: {}", e);
        }
    }
}

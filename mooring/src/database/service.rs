//! Database instance lifecycle

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::containers::manager::ContainerManager;
use crate::database::resolver::database_workload;
use crate::errors::EngineError;
use crate::models::database::{DatabaseEngine, DatabaseInstance, DatabaseStatus};
use crate::store::repository::DatabaseRepository;
use crate::utils::generate_uuid;

pub struct DatabaseService {
    repo: Arc<dyn DatabaseRepository>,
    containers: Arc<dyn ContainerManager>,
}

impl DatabaseService {
    pub fn new(repo: Arc<dyn DatabaseRepository>, containers: Arc<dyn ContainerManager>) -> Self {
        Self { repo, containers }
    }

    pub async fn create(
        &self,
        name: &str,
        project_id: &str,
        environment_id: &str,
        engine: DatabaseEngine,
    ) -> Result<DatabaseInstance, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "database name is required".to_string(),
            ));
        }
        let now = Utc::now();
        let database = DatabaseInstance {
            id: generate_uuid(),
            name: name.to_string(),
            project_id: project_id.to_string(),
            environment_id: environment_id.to_string(),
            engine,
            status: DatabaseStatus::Created,
            container_id: None,
            connection_string: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.save(&database).await?;
        info!(database_id = %database.id, engine = database.engine.kind(), "Created database");
        Ok(database)
    }

    pub async fn get(&self, id: &str) -> Result<DatabaseInstance, EngineError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("database {}", id)))
    }

    pub async fn list(&self) -> Result<Vec<DatabaseInstance>, EngineError> {
        self.repo.list().await
    }

    pub async fn list_with_containers(&self) -> Result<Vec<DatabaseInstance>, EngineError> {
        self.repo.list_with_containers().await
    }

    async fn save_status(
        &self,
        mut database: DatabaseInstance,
        status: DatabaseStatus,
    ) -> Result<DatabaseInstance, EngineError> {
        database.status = status;
        database.updated_at = Utc::now();
        self.repo.save(&database).await?;
        Ok(database)
    }

    /// Status written by reconciliation.
    pub async fn set_observed_status(
        &self,
        id: &str,
        status: DatabaseStatus,
    ) -> Result<DatabaseInstance, EngineError> {
        let database = self.get(id).await?;
        self.save_status(database, status).await
    }

    /// Pull, create and start the database container.
    ///
    /// Any failure leaves the instance `Failed`. A container that was created
    /// but failed to start is removed.
    pub async fn deploy(&self, id: &str) -> Result<DatabaseInstance, EngineError> {
        let database = self.get(id).await?;
        if database.status == DatabaseStatus::Deleting {
            return Err(EngineError::ValidationError(format!(
                "database {} is being deleted",
                id
            )));
        }
        let mut database = self.save_status(database, DatabaseStatus::Provisioning).await?;
        let workload = database_workload(&database);
        info!(database_id = %id, image = %workload.image, "Deploying database");

        if let Err(e) = self.containers.pull_image(&workload.image).await {
            self.save_status(database, DatabaseStatus::Failed).await?;
            return Err(e.into());
        }

        let container_id = match self.containers.create(&workload).await {
            Ok(container_id) => container_id,
            Err(e) => {
                self.save_status(database, DatabaseStatus::Failed).await?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.containers.start(&container_id).await {
            if let Err(cleanup) = self.containers.delete(&container_id).await {
                warn!(database_id = %id, container_id = %container_id, "Failed to remove container: {}", cleanup);
            }
            self.save_status(database, DatabaseStatus::Failed).await?;
            return Err(e.into());
        }

        database.container_id = Some(container_id);
        database.connection_string = Some(database.engine.connection_string());
        let database = self.save_status(database, DatabaseStatus::Running).await?;
        info!(database_id = %id, "Database running");
        Ok(database)
    }

    fn container_of(database: &DatabaseInstance) -> Result<String, EngineError> {
        database
            .container_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                EngineError::ValidationError(format!("database {} has no container", database.id))
            })
    }

    pub async fn start(&self, id: &str) -> Result<DatabaseInstance, EngineError> {
        let database = self.get(id).await?;
        self.containers.start(&Self::container_of(&database)?).await?;
        self.save_status(database, DatabaseStatus::Running).await
    }

    pub async fn stop(&self, id: &str) -> Result<DatabaseInstance, EngineError> {
        let database = self.get(id).await?;
        self.containers.stop(&Self::container_of(&database)?).await?;
        self.save_status(database, DatabaseStatus::Stopped).await
    }

    pub async fn restart(&self, id: &str) -> Result<DatabaseInstance, EngineError> {
        let database = self.get(id).await?;
        self.containers
            .restart(&Self::container_of(&database)?)
            .await?;
        self.save_status(database, DatabaseStatus::Running).await
    }

    /// Remove the instance. Container removal is best effort; the record is
    /// removed regardless.
    pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let database = self.get(id).await?;
        let container_id = database.container_id.clone().filter(|c| !c.is_empty());
        self.save_status(database, DatabaseStatus::Deleting).await?;

        if let Some(container_id) = container_id {
            if let Err(e) = self.containers.stop(&container_id).await {
                warn!(database_id = %id, container_id = %container_id, "Failed to stop container: {}", e);
            }
            if let Err(e) = self.containers.delete(&container_id).await {
                warn!(database_id = %id, container_id = %container_id, "Failed to delete container: {}", e);
            }
        }

        self.repo.delete(id).await?;
        info!(database_id = %id, "Deleted database");
        Ok(())
    }
}

//! Repository contracts consumed by the engine services

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::application::Application;
use crate::models::database::DatabaseInstance;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::proxy::ProxyRoute;

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Insert or replace
    async fn save(&self, deployment: &Deployment) -> Result<(), EngineError>;

    async fn get(&self, id: &str) -> Result<Option<Deployment>, EngineError>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool, EngineError>;

    async fn list(&self) -> Result<Vec<Deployment>, EngineError>;

    /// Newest first
    async fn list_by_application(&self, application_id: &str)
        -> Result<Vec<Deployment>, EngineError>;

    /// Highest deployment number for the application
    async fn latest_by_application(
        &self,
        application_id: &str,
    ) -> Result<Option<Deployment>, EngineError>;

    async fn list_by_status(&self, status: DeploymentStatus)
        -> Result<Vec<Deployment>, EngineError>;

    /// Append to the build log without rewriting the record
    async fn append_build_logs(&self, id: &str, text: &str) -> Result<(), EngineError>;

    async fn append_deploy_logs(&self, id: &str, text: &str) -> Result<(), EngineError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn save(&self, application: &Application) -> Result<(), EngineError>;

    async fn get(&self, id: &str) -> Result<Option<Application>, EngineError>;

    async fn list(&self) -> Result<Vec<Application>, EngineError>;
}

#[async_trait]
pub trait DatabaseRepository: Send + Sync {
    async fn save(&self, database: &DatabaseInstance) -> Result<(), EngineError>;

    async fn get(&self, id: &str) -> Result<Option<DatabaseInstance>, EngineError>;

    async fn delete(&self, id: &str) -> Result<bool, EngineError>;

    async fn list(&self) -> Result<Vec<DatabaseInstance>, EngineError>;

    async fn list_with_containers(&self) -> Result<Vec<DatabaseInstance>, EngineError>;
}

#[async_trait]
pub trait ProxyRouteRepository: Send + Sync {
    async fn save(&self, route: &ProxyRoute) -> Result<(), EngineError>;

    async fn get(&self, id: &str) -> Result<Option<ProxyRoute>, EngineError>;

    async fn delete(&self, id: &str) -> Result<bool, EngineError>;

    async fn list(&self) -> Result<Vec<ProxyRoute>, EngineError>;
}

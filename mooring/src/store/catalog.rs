//! Record store backing every repository

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::models::application::Application;
use crate::models::database::DatabaseInstance;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::proxy::ProxyRoute;
use crate::storage::layout::StorageLayout;
use crate::store::collection::{Collection, Record};
use crate::store::logbook::{LogBook, LogKind};
use crate::store::repository::{
    ApplicationRepository, DatabaseRepository, DeploymentRepository, ProxyRouteRepository,
};

impl Record for Deployment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Application {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for DatabaseInstance {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ProxyRoute {
    fn id(&self) -> &str {
        &self.id
    }
}

/// All engine records
pub struct Store {
    deployments: Collection<Deployment>,
    applications: Collection<Application>,
    databases: Collection<DatabaseInstance>,
    proxy_routes: Collection<ProxyRoute>,
    deployment_logs: LogBook,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            deployments: Collection::in_memory("deployments"),
            applications: Collection::in_memory("applications"),
            databases: Collection::in_memory("databases"),
            proxy_routes: Collection::in_memory("proxy_routes"),
            deployment_logs: LogBook::in_memory(),
        }
    }

    /// Open the store under `layout`, creating its directories.
    pub async fn open(layout: &StorageLayout) -> Result<Self, EngineError> {
        layout.setup().await?;
        Ok(Self {
            deployments: Collection::open("deployments", layout.deployments_file()).await?,
            applications: Collection::open("applications", layout.applications_file()).await?,
            databases: Collection::open("databases", layout.databases_file()).await?,
            proxy_routes: Collection::open("proxy_routes", layout.proxy_routes_file()).await?,
            deployment_logs: LogBook::open(layout.deployment_logs_dir()),
        })
    }

    /// Fill in the log text kept outside the record.
    async fn with_logs(&self, mut deployment: Deployment) -> Result<Deployment, EngineError> {
        let logs = self.deployment_logs.read(&deployment.id).await?;
        deployment.build_logs = logs.build;
        deployment.deploy_logs = logs.deploy;
        Ok(deployment)
    }

    async fn all_with_logs(
        &self,
        deployments: Vec<Deployment>,
    ) -> Result<Vec<Deployment>, EngineError> {
        let mut filled = Vec::with_capacity(deployments.len());
        for deployment in deployments {
            filled.push(self.with_logs(deployment).await?);
        }
        Ok(filled)
    }

    async fn append_logs(&self, id: &str, kind: LogKind, text: &str) -> Result<(), EngineError> {
        if self.deployments.get(id).await.is_none() {
            return Err(EngineError::NotFound(format!("deployment {}", id)));
        }
        self.deployment_logs.append(id, kind, text).await
    }
}

#[async_trait]
impl DeploymentRepository for Store {
    /// Log text is not part of the stored record; see `append_build_logs`.
    async fn save(&self, deployment: &Deployment) -> Result<(), EngineError> {
        self.deployments
            .put(Deployment {
                build_logs: String::new(),
                deploy_logs: String::new(),
                ..deployment.clone()
            })
            .await
    }

    async fn get(&self, id: &str) -> Result<Option<Deployment>, EngineError> {
        match self.deployments.get(id).await {
            Some(deployment) => Ok(Some(self.with_logs(deployment).await?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        let removed = self.deployments.remove(id).await?.is_some();
        if removed {
            self.deployment_logs.remove(id).await?;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<Deployment>, EngineError> {
        self.all_with_logs(self.deployments.values().await).await
    }

    async fn list_by_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<Deployment>, EngineError> {
        let mut deployments = self
            .deployments
            .filter(|d| d.application_id == application_id)
            .await;
        deployments.sort_by(|a, b| b.deployment_number.cmp(&a.deployment_number));
        self.all_with_logs(deployments).await
    }

    async fn latest_by_application(
        &self,
        application_id: &str,
    ) -> Result<Option<Deployment>, EngineError> {
        let latest = self
            .deployments
            .filter(|d| d.application_id == application_id)
            .await
            .into_iter()
            .max_by_key(|d| d.deployment_number);
        match latest {
            Some(deployment) => Ok(Some(self.with_logs(deployment).await?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, EngineError> {
        self.all_with_logs(self.deployments.filter(|d| d.status == status).await)
            .await
    }

    async fn append_build_logs(&self, id: &str, text: &str) -> Result<(), EngineError> {
        self.append_logs(id, LogKind::Build, text).await
    }

    async fn append_deploy_logs(&self, id: &str, text: &str) -> Result<(), EngineError> {
        self.append_logs(id, LogKind::Deploy, text).await
    }
}

#[async_trait]
impl ApplicationRepository for Store {
    async fn save(&self, application: &Application) -> Result<(), EngineError> {
        self.applications.put(application.clone()).await
    }

    async fn get(&self, id: &str) -> Result<Option<Application>, EngineError> {
        Ok(self.applications.get(id).await)
    }

    async fn list(&self) -> Result<Vec<Application>, EngineError> {
        Ok(self.applications.values().await)
    }
}

#[async_trait]
impl DatabaseRepository for Store {
    async fn save(&self, database: &DatabaseInstance) -> Result<(), EngineError> {
        self.databases.put(database.clone()).await
    }

    async fn get(&self, id: &str) -> Result<Option<DatabaseInstance>, EngineError> {
        Ok(self.databases.get(id).await)
    }

    async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.databases.remove(id).await?.is_some())
    }

    async fn list(&self) -> Result<Vec<DatabaseInstance>, EngineError> {
        Ok(self.databases.values().await)
    }

    async fn list_with_containers(&self) -> Result<Vec<DatabaseInstance>, EngineError> {
        Ok(self
            .databases
            .filter(|db| db.container_id.as_deref().is_some_and(|id| !id.is_empty()))
            .await)
    }
}

#[async_trait]
impl ProxyRouteRepository for Store {
    async fn save(&self, route: &ProxyRoute) -> Result<(), EngineError> {
        self.proxy_routes.put(route.clone()).await
    }

    async fn get(&self, id: &str) -> Result<Option<ProxyRoute>, EngineError> {
        Ok(self.proxy_routes.get(id).await)
    }

    async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.proxy_routes.remove(id).await?.is_some())
    }

    async fn list(&self) -> Result<Vec<ProxyRoute>, EngineError> {
        Ok(self.proxy_routes.values().await)
    }
}

//! Server state

use std::sync::Arc;

use crate::containers::manager::ContainerManager;
use crate::database::service::DatabaseService;
use crate::deploy::executor::DeploymentExecutor;
use crate::deploy::service::DeploymentService;
use crate::proxy::service::ProxyConfigurator;
use crate::store::repository::ApplicationRepository;

/// Server state shared across handlers
pub struct ServerState {
    pub executor: DeploymentExecutor,
    pub deployments: Arc<DeploymentService>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub databases: Arc<DatabaseService>,
    pub proxy: Arc<ProxyConfigurator>,
    pub containers: Arc<dyn ContainerManager>,
}

impl ServerState {
    pub fn new(
        executor: DeploymentExecutor,
        applications: Arc<dyn ApplicationRepository>,
        databases: Arc<DatabaseService>,
        proxy: Arc<ProxyConfigurator>,
        containers: Arc<dyn ContainerManager>,
    ) -> Self {
        Self {
            deployments: executor.deployments().clone(),
            executor,
            applications,
            databases,
            proxy,
            containers,
        }
    }
}

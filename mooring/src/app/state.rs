//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::build::service::BuildExecutor;
use crate::containers::cli::CliContainerManager;
use crate::containers::manager::ContainerManager;
use crate::database::service::DatabaseService;
use crate::deploy::executor::DeploymentExecutor;
use crate::deploy::service::DeploymentService;
use crate::errors::EngineError;
use crate::proxy::service::ProxyConfigurator;
use crate::reconcile::targets::{DatabaseTarget, DeploymentTarget};
use crate::reconcile::{Reconcile, Reconciler};
use crate::server::state::ServerState;
use crate::store::catalog::Store;

/// Main application state
pub struct AppState {
    /// Record store behind every repository
    pub store: Arc<Store>,

    /// Container engine
    pub containers: Arc<dyn ContainerManager>,

    pub deployments: Arc<DeploymentService>,

    pub executor: DeploymentExecutor,

    pub databases: Arc<DatabaseService>,

    pub proxy: Arc<ProxyConfigurator>,

    /// Deployment and database reconcilers, in that order
    pub reconcilers: Vec<Arc<dyn Reconcile>>,
}

impl AppState {
    /// Open the record store and connect to the configured engine CLI
    pub async fn init(options: &AppOptions) -> Result<Self, EngineError> {
        info!("Initializing application state...");

        let store = match &options.storage {
            Some(layout) => {
                info!(dir = %layout.base_dir.display(), "Opening record store");
                Store::open(layout).await?
            }
            None => {
                info!("No data directory configured, keeping records in memory");
                Store::in_memory()
            }
        };

        let binary = options.container_engine.binary();
        info!(engine = %binary, "Using container engine CLI");
        let containers: Arc<dyn ContainerManager> = Arc::new(CliContainerManager::new(binary));

        Ok(Self::assemble(options, Arc::new(store), containers))
    }

    /// Wire services over an existing store and engine
    pub fn assemble(
        options: &AppOptions,
        store: Arc<Store>,
        containers: Arc<dyn ContainerManager>,
    ) -> Self {
        let deployments = Arc::new(DeploymentService::new(store.clone(), containers.clone()));
        let builder = Arc::new(BuildExecutor::new(
            containers.clone(),
            options.builder.clone(),
            options.container_engine.socket_path.clone(),
        ));

        let mut executor = DeploymentExecutor::new(
            deployments.clone(),
            store.clone(),
            builder,
            containers.clone(),
            options.proxy.clone(),
        );
        if let Some(max) = options.max_concurrent_deployments {
            executor = executor.with_concurrency_limit(max);
        }

        let databases = Arc::new(DatabaseService::new(store.clone(), containers.clone()));
        let proxy = Arc::new(ProxyConfigurator::new(
            store.clone(),
            options.proxy.config_dir.clone(),
        ));

        let reconcilers: Vec<Arc<dyn Reconcile>> = vec![
            Arc::new(Reconciler::new(
                DeploymentTarget::new(deployments.clone()),
                containers.clone(),
            )),
            Arc::new(Reconciler::new(
                DatabaseTarget::new(databases.clone()),
                containers.clone(),
            )),
        ];

        Self {
            store,
            containers,
            deployments,
            executor,
            databases,
            proxy,
            reconcilers,
        }
    }

    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.executor.clone(),
            self.store.clone(),
            self.databases.clone(),
            self.proxy.clone(),
            self.containers.clone(),
        )
    }
}

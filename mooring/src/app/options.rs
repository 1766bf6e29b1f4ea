//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{BuilderSettings, ContainerEngineSettings, ProxySettings, Settings};
use crate::workers::reconciler;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Record storage. Records stay in memory when unset.
    pub storage: Option<StorageLayout>,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Enable the status reconciler worker
    pub enable_reconciler: bool,

    /// Reconciler worker options
    pub reconciler: reconciler::Options,

    pub container_engine: ContainerEngineSettings,

    pub proxy: ProxySettings,

    pub builder: BuilderSettings,

    /// Upper bound on concurrently executing deployments
    pub max_concurrent_deployments: Option<usize>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: Some(StorageLayout::default()),
            enable_server: true,
            server: ServerOptions::default(),
            enable_reconciler: true,
            reconciler: reconciler::Options::default(),
            container_engine: ContainerEngineSettings::default(),
            proxy: ProxySettings::default(),
            builder: BuilderSettings::default(),
            max_concurrent_deployments: None,
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: settings.data_dir.clone().map(StorageLayout::new),
            enable_server: true,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            enable_reconciler: true,
            reconciler: reconciler::Options {
                interval: Duration::from_secs(settings.reconcile_interval_secs.max(1)),
            },
            container_engine: settings.container_engine.clone(),
            proxy: settings.proxy.clone(),
            builder: settings.builder.clone(),
            max_concurrent_deployments: settings.max_concurrent_deployments,
        }
    }
}

/// Lifecycle options for the engine
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

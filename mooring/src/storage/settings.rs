//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files under `<data_dir>/logs`
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for persisted records. Records are kept in memory only when
    /// this is unset.
    #[serde(default = "default_data_dir")]
    pub data_dir: Option<PathBuf>,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Container engine configuration
    #[serde(default)]
    pub container_engine: ContainerEngineSettings,

    /// Status reconciliation interval in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Reverse proxy configuration
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Build helper images
    #[serde(default)]
    pub builder: BuilderSettings,

    /// Upper bound on concurrently executing deployments. Unbounded when unset.
    #[serde(default)]
    pub max_concurrent_deployments: Option<usize>,
}

fn default_data_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/var/lib/mooring"))
}

fn default_reconcile_interval() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            data_dir: default_data_dir(),
            server: ServerSettings::default(),
            container_engine: ContainerEngineSettings::default(),
            reconcile_interval_secs: default_reconcile_interval(),
            proxy: ProxySettings::default(),
            builder: BuilderSettings::default(),
            max_concurrent_deployments: None,
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3030
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Which container engine CLI to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Docker,
    Podman,
}

impl EngineKind {
    pub fn default_binary(&self) -> &'static str {
        match self {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
        }
    }
}

/// Container engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerEngineSettings {
    #[serde(default)]
    pub kind: EngineKind,

    /// Override for the CLI binary path
    #[serde(default)]
    pub binary: Option<String>,

    /// Host socket mounted into build helpers
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

fn default_socket_path() -> String {
    "/var/run/docker.sock".to_string()
}

impl ContainerEngineSettings {
    pub fn binary(&self) -> String {
        self.binary
            .clone()
            .unwrap_or_else(|| self.kind.default_binary().to_string())
    }
}

impl Default for ContainerEngineSettings {
    fn default() -> Self {
        Self {
            kind: EngineKind::Docker,
            binary: None,
            socket_path: default_socket_path(),
        }
    }
}

/// Reverse proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Directory watched by the proxy's file provider
    #[serde(default = "default_proxy_config_dir")]
    pub config_dir: PathBuf,

    /// Entrypoint name used in routing labels
    #[serde(default = "default_proxy_entrypoint")]
    pub entrypoint: String,

    /// Network the proxy shares with workloads
    #[serde(default)]
    pub network: Option<String>,

    /// Load-balancer port used when an application declares no exposed port
    #[serde(default = "default_proxy_port")]
    pub default_port: u16,
}

fn default_proxy_config_dir() -> PathBuf {
    PathBuf::from("/etc/mooring/traefik")
}

fn default_proxy_entrypoint() -> String {
    "web".to_string()
}

fn default_proxy_port() -> u16 {
    8080
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            config_dir: default_proxy_config_dir(),
            entrypoint: default_proxy_entrypoint(),
            network: None,
            default_port: default_proxy_port(),
        }
    }
}

/// Build helper images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderSettings {
    #[serde(default = "default_nixpacks_image")]
    pub nixpacks_image: String,

    /// Image carrying git and the docker CLI, used by the Static, Dockerfile
    /// and Compose strategies
    #[serde(default = "default_docker_image")]
    pub docker_image: String,
}

fn default_nixpacks_image() -> String {
    "railwayapp/nixpacks:latest".to_string()
}

fn default_docker_image() -> String {
    "docker:27-git".to_string()
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            nixpacks_image: default_nixpacks_image(),
            docker_image: default_docker_image(),
        }
    }
}

//! Container engine contract.
//!
//! Every runtime interaction of the engine (build helpers, application
//! workloads, database instances) goes through [`ContainerManager`].

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// Errors from container engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    /// The container or image does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The engine rejected the request.
    #[error("engine error: {0}")]
    Engine(String),

    /// The engine reply could not be understood.
    #[error("unexpected engine output: {0}")]
    Parse(String),

    /// I/O with the engine failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound(_))
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Combined stdout/stderr of a container.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Fully resolved container configuration about to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    pub image: String,
    pub name: String,
    /// Container port -> host port. An empty host port publishes on an
    /// engine-assigned port.
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Host path or named volume -> container path
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub restart_policy: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub entrypoint: Vec<String>,
    #[serde(default)]
    pub auto_remove: bool,
}

/// Observed container state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Engine state keyword, e.g. `running` or `exited`
    pub state: String,
    /// Human readable status, e.g. `Up 5 minutes`
    pub status: String,
    /// Published ports as `host_ip:host_port->container_port/proto`
    #[serde(default)]
    pub ports: Vec<String>,
}

/// Image build request for [`ContainerManager::build_image`].
#[derive(Debug, Clone, Default)]
pub struct ImageBuildConfig {
    pub context_dir: String,
    pub dockerfile: String,
    pub tag: String,
    pub build_args: BTreeMap<String, String>,
}

/// Terminal dimensions for interactive sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

/// Streams attached to an interactive exec session.
pub struct ExecSession {
    pub stdin: Pin<Box<dyn AsyncRead + Send>>,
    pub stdout: Pin<Box<dyn AsyncWrite + Send>>,
    pub stderr: Pin<Box<dyn AsyncWrite + Send>>,
    pub resize: Option<mpsc::Receiver<TerminalSize>>,
}

/// Uniform lifecycle operations over a container runtime.
#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Short engine identifier used in logs.
    fn engine(&self) -> &str;

    /// Create a container and return its id.
    async fn create(&self, config: &WorkloadDescriptor) -> Result<String>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn stop(&self, id: &str) -> Result<()>;

    async fn restart(&self, id: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Block until the container exits and return its exit code.
    async fn wait(&self, id: &str) -> Result<i64>;

    /// Combined stdout/stderr. With `follow` the stream ends when the
    /// container exits.
    async fn stream_logs(&self, id: &str, follow: bool) -> Result<LogStream>;

    /// Run a command inside a running container, wiring the given streams.
    async fn exec_interactive(&self, id: &str, command: &[String], session: ExecSession)
        -> Result<()>;

    async fn list(&self) -> Result<Vec<ContainerInfo>>;

    async fn inspect(&self, id: &str) -> Result<ContainerInfo>;

    /// Make an image available locally, pulling it only when absent.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    async fn build_image(&self, config: &ImageBuildConfig) -> Result<()>;
}

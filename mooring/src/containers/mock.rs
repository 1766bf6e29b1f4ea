//! In-memory container manager for tests.
//!
//! Simulates container lifecycles without touching a real engine. Failure
//! flags make individual operations return engine errors.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::containers::manager::{
    ContainerError, ContainerInfo, ContainerManager, ExecSession, ImageBuildConfig, LogStream,
    Result, WorkloadDescriptor,
};

#[derive(Debug, Clone)]
struct MockContainer {
    config: WorkloadDescriptor,
    info: ContainerInfo,
}

#[derive(Debug, Default)]
struct MockState {
    containers: HashMap<String, MockContainer>,
    next_id: u64,
    log_output: String,
    created: Vec<WorkloadDescriptor>,
    pulled: Vec<String>,
    stopped: Vec<String>,
    deleted: Vec<String>,
    fail_start_prefix: Option<String>,
}

/// Mock container manager.
#[derive(Debug, Default)]
pub struct MockContainerManager {
    state: Mutex<MockState>,
    /// `pull_image` fails
    pub fail_pull: AtomicBool,
    /// `create` fails
    pub fail_create: AtomicBool,
    /// `start` fails
    pub fail_start: AtomicBool,
    /// `stop` fails
    pub fail_stop: AtomicBool,
    /// `delete` fails
    pub fail_delete: AtomicBool,
    /// `inspect` fails with an engine error (not a not-found)
    pub fail_inspect: AtomicBool,
    /// `stream_logs` fails
    pub fail_logs: AtomicBool,
    exit_code: AtomicI64,
    inspect_calls: AtomicUsize,
}

impl MockContainerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit code returned by `wait`.
    pub fn set_exit_code(&self, code: i64) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    /// Output returned by `stream_logs` for every container.
    pub async fn set_log_output(&self, output: impl Into<String>) {
        self.state.lock().await.log_output = output.into();
    }

    /// `start` fails for containers whose name starts with `prefix`.
    pub async fn fail_start_for(&self, prefix: impl Into<String>) {
        self.state.lock().await.fail_start_prefix = Some(prefix.into());
    }

    /// Register a container that exists outside of `create`.
    pub async fn insert_container(&self, id: &str, state: &str, status: &str) {
        let mut guard = self.state.lock().await;
        guard.containers.insert(
            id.to_string(),
            MockContainer {
                config: WorkloadDescriptor::default(),
                info: ContainerInfo {
                    id: id.to_string(),
                    name: id.to_string(),
                    state: state.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                },
            },
        );
    }

    /// Change the observed state of an existing container.
    pub async fn set_state(&self, id: &str, state: &str, status: &str) {
        let mut guard = self.state.lock().await;
        if let Some(container) = guard.containers.get_mut(id) {
            container.info.state = state.to_string();
            container.info.status = status.to_string();
        }
    }

    /// Drop a container as if it was removed behind the engine's back.
    pub async fn remove_container(&self, id: &str) {
        self.state.lock().await.containers.remove(id);
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.containers.contains_key(id)
    }

    /// Every descriptor passed to `create`, in order.
    pub async fn created(&self) -> Vec<WorkloadDescriptor> {
        self.state.lock().await.created.clone()
    }

    pub async fn pulled(&self) -> Vec<String> {
        self.state.lock().await.pulled.clone()
    }

    pub async fn stopped(&self) -> Vec<String> {
        self.state.lock().await.stopped.clone()
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    fn engine_error(flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(ContainerError::Engine(format!("mock {} failure", operation)))
        } else {
            Ok(())
        }
    }

    async fn update(&self, id: &str, state: &str, status: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let container = guard
            .containers
            .get_mut(id)
            .ok_or_else(|| ContainerError::NotFound(format!("No such container: {}", id)))?;
        container.info.state = state.to_string();
        container.info.status = status.to_string();
        Ok(())
    }
}

#[async_trait]
impl ContainerManager for MockContainerManager {
    fn engine(&self) -> &str {
        "mock"
    }

    async fn create(&self, config: &WorkloadDescriptor) -> Result<String> {
        Self::engine_error(&self.fail_create, "create")?;

        let mut guard = self.state.lock().await;
        guard.next_id += 1;
        let id = format!("mock-{}", guard.next_id);
        guard.created.push(config.clone());
        guard.containers.insert(
            id.clone(),
            MockContainer {
                config: config.clone(),
                info: ContainerInfo {
                    id: id.clone(),
                    name: config.name.clone(),
                    image: config.image.clone(),
                    state: "created".to_string(),
                    status: "Created".to_string(),
                    ports: Vec::new(),
                },
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        Self::engine_error(&self.fail_start, "start")?;
        {
            let guard = self.state.lock().await;
            let name_matches = match (&guard.fail_start_prefix, guard.containers.get(id)) {
                (Some(prefix), Some(container)) => container.info.name.starts_with(prefix.as_str()),
                _ => false,
            };
            if name_matches {
                return Err(ContainerError::Engine("mock start failure".to_string()));
            }
        }
        self.update(id, "running", "Up").await
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.state.lock().await.stopped.push(id.to_string());
        Self::engine_error(&self.fail_stop, "stop")?;
        self.update(id, "exited", "Exited (0)").await
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.update(id, "running", "Up").await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.state.lock().await.deleted.push(id.to_string());
        Self::engine_error(&self.fail_delete, "delete")?;
        self.state
            .lock()
            .await
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ContainerError::NotFound(format!("No such container: {}", id)))
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        let code = self.exit_code.load(Ordering::SeqCst);
        let mut guard = self.state.lock().await;
        let container = guard
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(format!("No such container: {}", id)))?;
        if container.config.auto_remove {
            guard.containers.remove(id);
        } else if let Some(container) = guard.containers.get_mut(id) {
            container.info.state = "exited".to_string();
            container.info.status = format!("Exited ({})", code);
        }
        Ok(code)
    }

    async fn stream_logs(&self, _id: &str, _follow: bool) -> Result<LogStream> {
        Self::engine_error(&self.fail_logs, "logs")?;
        let output = self.state.lock().await.log_output.clone();
        Ok(Box::pin(Cursor::new(output.into_bytes())))
    }

    async fn exec_interactive(
        &self,
        id: &str,
        command: &[String],
        mut session: ExecSession,
    ) -> Result<()> {
        if !self.contains(id).await {
            return Err(ContainerError::NotFound(format!("No such container: {}", id)));
        }
        session
            .stdout
            .write_all(format!("exec {}\n", command.join(" ")).as_bytes())
            .await?;
        session.stdout.flush().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>> {
        let guard = self.state.lock().await;
        let mut infos: Vec<ContainerInfo> =
            guard.containers.values().map(|c| c.info.clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        Self::engine_error(&self.fail_inspect, "inspect")?;
        self.state
            .lock()
            .await
            .containers
            .get(id)
            .map(|c| c.info.clone())
            .ok_or_else(|| ContainerError::NotFound(format!("No such container: {}", id)))
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        Self::engine_error(&self.fail_pull, "pull")?;
        self.state.lock().await.pulled.push(reference.to_string());
        Ok(())
    }

    async fn build_image(&self, _config: &ImageBuildConfig) -> Result<()> {
        Ok(())
    }
}

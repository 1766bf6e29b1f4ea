//! Status reconciliation.
//!
//! Periodically compares the recorded status of container-backed records
//! with what the container engine reports and writes corrections. The same
//! [`Reconciler`] drives deployments and database instances through the
//! [`ReconcileTarget`] adapters in [`targets`].

pub mod targets;

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::containers::manager::ContainerManager;
use crate::errors::EngineError;

/// Engine-side state, reduced to what the records can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    Running,
    Stopped,
    Provisioning,
    Failed,
}

/// Map an engine state keyword, falling back to the status text.
pub fn map_container_state(state: &str, status: &str) -> ObservedState {
    match state.to_ascii_lowercase().as_str() {
        "running" => ObservedState::Running,
        "exited" | "stopped" | "paused" => ObservedState::Stopped,
        "restarting" => ObservedState::Provisioning,
        "dead" | "removing" => ObservedState::Failed,
        _ => {
            let status = status.to_ascii_lowercase();
            if status.contains("up") {
                ObservedState::Running
            } else if status.contains("exited") || status.contains("stopped") {
                ObservedState::Stopped
            } else {
                ObservedState::Failed
            }
        }
    }
}

/// A record whose status follows a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracked<S> {
    pub id: String,
    pub container_id: String,
    pub status: S,
}

/// Record kind the reconciler can keep in sync.
#[async_trait]
pub trait ReconcileTarget: Send + Sync {
    type Status: Copy + PartialEq + Display + Send + Sync;

    fn kind(&self) -> &'static str;

    /// Records to check this tick. Only records with a container.
    async fn tracked(&self) -> Result<Vec<Tracked<Self::Status>>, EngineError>;

    /// Status the record should have, or `None` to leave it alone.
    fn desired(&self, observed: ObservedState) -> Option<Self::Status>;

    async fn write_status(&self, id: &str, status: Self::Status) -> Result<(), EngineError>;
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub updated: usize,
    pub errors: usize,
}

pub struct Reconciler<T: ReconcileTarget> {
    target: T,
    containers: Arc<dyn ContainerManager>,
}

impl<T: ReconcileTarget> Reconciler<T> {
    pub fn new(target: T, containers: Arc<dyn ContainerManager>) -> Self {
        Self { target, containers }
    }

    /// Check every tracked record once, in sequence. Writes happen only
    /// when the status changes.
    pub async fn tick(&self) -> Result<TickReport, EngineError> {
        let kind = self.target.kind();
        let tracked = self.target.tracked().await?;
        let mut report = TickReport {
            checked: tracked.len(),
            ..Default::default()
        };

        for record in tracked {
            let observed = match self.containers.inspect(&record.container_id).await {
                Ok(info) => map_container_state(&info.state, &info.status),
                Err(e) => {
                    if e.is_not_found() {
                        debug!(kind, id = %record.id, container_id = %record.container_id, "Container not found");
                    } else {
                        warn!(kind, id = %record.id, container_id = %record.container_id, "Failed to inspect container: {}", e);
                    }
                    ObservedState::Stopped
                }
            };

            let Some(desired) = self.target.desired(observed) else {
                continue;
            };
            if desired == record.status {
                continue;
            }

            info!(
                kind,
                id = %record.id,
                from = %record.status,
                to = %desired,
                "Correcting status drift"
            );
            match self.target.write_status(&record.id, desired).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!(kind, id = %record.id, "Failed to update status: {}", e);
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Type-erased reconciler so the worker can drive several kinds.
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn tick(&self) -> Result<TickReport, EngineError>;
}

#[async_trait]
impl<T: ReconcileTarget> Reconcile for Reconciler<T> {
    fn kind(&self) -> &'static str {
        self.target.kind()
    }

    async fn tick(&self) -> Result<TickReport, EngineError> {
        Reconciler::tick(self).await
    }
}

//! Finite state machine for deployment records

use chrono::{DateTime, Utc};

use crate::errors::EngineError;
use crate::models::deployment::{Deployment, DeploymentStatus};

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Build helper launched
    StartBuild,

    /// Image produced
    CompleteBuild,

    /// Workload container being created
    StartDeploy,

    /// Workload container started
    CompleteDeploy,

    /// Build or deploy failed
    Fail(String),

    /// Abandon before the image is built
    Cancel,

    /// Explicit stop of a running deployment
    Stop,
}

/// Status reached by applying `event` in `status`, or `None` when the
/// transition is not allowed.
pub fn next_status(status: DeploymentStatus, event: &DeploymentEvent) -> Option<DeploymentStatus> {
    use DeploymentStatus::*;

    match (status, event) {
        (Pending, DeploymentEvent::StartBuild) => Some(Building),
        (Building, DeploymentEvent::CompleteBuild) => Some(BuildComplete),
        (BuildComplete, DeploymentEvent::StartDeploy) => Some(Deploying),
        (Deploying, DeploymentEvent::CompleteDeploy) => Some(Running),

        (Pending | Building | BuildComplete | Deploying, DeploymentEvent::Fail(_)) => Some(Failed),
        (Pending | Building, DeploymentEvent::Cancel) => Some(Cancelled),
        (Running, DeploymentEvent::Stop) => Some(Stopped),

        _ => None,
    }
}

impl Deployment {
    /// Apply an event to the record, stamping phase timestamps.
    ///
    /// The record is left untouched when the transition is rejected.
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), EngineError> {
        self.process_at(event, Utc::now())
    }

    pub fn process_at(
        &mut self,
        event: DeploymentEvent,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let new_status = next_status(self.status, &event).ok_or_else(|| {
            EngineError::TransitionError(format!(
                "deployment {} cannot {:?} from {}",
                self.id, event, self.status
            ))
        })?;

        match &event {
            DeploymentEvent::StartBuild => self.build_started_at = Some(now),
            DeploymentEvent::CompleteBuild => self.build_completed_at = Some(now),
            DeploymentEvent::StartDeploy => self.deploy_started_at = Some(now),
            DeploymentEvent::CompleteDeploy => self.deploy_completed_at = Some(now),
            DeploymentEvent::Fail(message) => self.error_message = Some(message.clone()),
            DeploymentEvent::Stop => self.stopped_at = Some(now),
            DeploymentEvent::Cancel => {}
        }

        self.status = new_status;
        self.updated_at = now;
        Ok(())
    }
}

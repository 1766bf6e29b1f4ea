//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Building,
    BuildComplete,
    Deploying,
    Running,
    Failed,
    Cancelled,
    Stopped,
}

impl DeploymentStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed | DeploymentStatus::Cancelled | DeploymentStatus::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::BuildComplete => "build_complete",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Cancelled => "cancelled",
            DeploymentStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What started a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    #[default]
    Manual,
    GitPush,
    Webhook,
    Api,
    Scheduled,
    Rollback,
}

/// One build+deploy attempt of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub application_id: String,
    /// 1-based, increasing per application
    pub deployment_number: u32,
    pub is_production: bool,
    pub triggered_by: Option<String>,
    pub trigger_type: TriggerType,
    pub image_tag: String,

    pub git_commit_hash: Option<String>,
    pub git_commit_message: Option<String>,
    pub git_branch: Option<String>,
    pub git_author_name: Option<String>,

    pub status: DeploymentStatus,
    pub container_id: Option<String>,
    pub image_digest: Option<String>,
    #[serde(default)]
    pub build_logs: String,
    #[serde(default)]
    pub deploy_logs: String,
    pub error_message: Option<String>,

    pub build_started_at: Option<DateTime<Utc>>,
    pub build_completed_at: Option<DateTime<Utc>>,
    pub deploy_started_at: Option<DateTime<Utc>>,
    pub deploy_completed_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn build_duration_secs(&self) -> Option<i64> {
        match (self.build_started_at, self.build_completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    pub fn deploy_duration_secs(&self) -> Option<i64> {
        match (self.deploy_started_at, self.deploy_completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

/// Request to create a deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDeployment {
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub is_production: bool,
    #[serde(default)]
    pub triggered_by: Option<String>,
    #[serde(default)]
    pub trigger_type: TriggerType,
    /// Defaults to `mooring/<application_id>:<deployment_number>`
    #[serde(default)]
    pub image_tag: Option<String>,
    #[serde(default)]
    pub git_commit_hash: Option<String>,
    #[serde(default)]
    pub git_commit_message: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub git_author_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&DeploymentStatus::BuildComplete).unwrap(),
            "\"build_complete\""
        );
        let status: DeploymentStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, DeploymentStatus::Cancelled);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(DeploymentStatus::Stopped.is_terminal());
        assert!(!DeploymentStatus::Running.is_terminal());
        assert!(!DeploymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_trigger_type_serde() {
        let trigger: TriggerType = serde_json::from_str("\"git_push\"").unwrap();
        assert_eq!(trigger, TriggerType::GitPush);
    }
}

//! Engine API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body returned with every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Buffered logs of one deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub deployment_id: String,
    pub status: String,
    pub build_logs: String,
    pub deploy_logs: String,
}

/// Query of the live log endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveLogsQuery {
    /// Keep the stream open until the container exits
    #[serde(default)]
    pub follow: bool,
}

/// Returned when a deployment has been accepted for background execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentAccepted {
    pub id: String,
    pub application_id: String,
    pub deployment_number: u32,
    pub image_tag: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Paged list wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

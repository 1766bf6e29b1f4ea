//! Reverse proxy route models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteProtocol {
    #[default]
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTls {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cert_resolver: Option<String>,
}

fn default_health_interval() -> String {
    "30s".to_string()
}

fn default_health_timeout() -> String {
    "5s".to_string()
}

fn default_health_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHealthCheck {
    pub path: String,
    #[serde(default = "default_health_interval")]
    pub interval: String,
    #[serde(default = "default_health_timeout")]
    pub timeout: String,
    #[serde(default = "default_health_retries")]
    pub retries: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// An explicit route rendered into the proxy's file provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub id: String,
    pub name: String,
    pub service_name: String,
    #[serde(default)]
    pub container_id: Option<String>,
    pub hostnames: Vec<String>,
    pub target_url: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: RouteProtocol,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub strip_prefix: bool,
    #[serde(default)]
    pub tls: Option<RouteTls>,
    #[serde(default)]
    pub health_check: Option<RouteHealthCheck>,
    #[serde(default)]
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProxyRoute {
    pub fn is_active(&self) -> bool {
        self.status == RouteStatus::Active
    }

    pub fn tls_enabled(&self) -> bool {
        self.protocol == RouteProtocol::Https || self.tls.as_ref().is_some_and(|tls| tls.enabled)
    }
}

/// Fields accepted when creating or replacing a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub name: String,
    pub service_name: String,
    #[serde(default)]
    pub container_id: Option<String>,
    pub hostnames: Vec<String>,
    pub target_url: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: RouteProtocol,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub strip_prefix: bool,
    #[serde(default)]
    pub tls: Option<RouteTls>,
    #[serde(default)]
    pub health_check: Option<RouteHealthCheck>,
    #[serde(default)]
    pub status: RouteStatus,
}

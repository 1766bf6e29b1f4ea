//! Application records read by the engine

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::types::BuildpackConfig;

/// Where an application's code comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentSource {
    Git {
        url: String,
        #[serde(default)]
        branch: Option<String>,
        /// Context root inside the repository
        #[serde(default)]
        path: Option<String>,
    },
    Registry {
        image: String,
        #[serde(default)]
        tag: Option<String>,
    },
    Upload {
        filename: String,
        file_path: String,
    },
}

impl DeploymentSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DeploymentSource::Git { .. } => "git",
            DeploymentSource::Registry { .. } => "registry",
            DeploymentSource::Upload { .. } => "upload",
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Published container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    /// Engine-assigned when unset
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

/// A deployable application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub source: DeploymentSource,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub generated_domain: Option<String>,
    #[serde(default)]
    pub exposed_ports: Vec<u16>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub buildpack: BuildpackConfig,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    /// Disk mounts, host path -> container path
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Assigned domain, falling back to the generated one
    pub fn routing_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.generated_domain.as_deref().filter(|d| !d.is_empty()))
    }
}

/// Application fields accepted from the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub name: String,
    pub source: DeploymentSource,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub generated_domain: Option<String>,
    #[serde(default)]
    pub exposed_ports: Vec<u16>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub buildpack: BuildpackConfig,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
}

impl ApplicationRequest {
    /// Build the record stored under `id`, keeping the creation time of an
    /// existing record.
    pub fn into_application(self, id: &str, existing: Option<&Application>) -> Application {
        let now = Utc::now();
        Application {
            id: id.to_string(),
            name: self.name,
            source: self.source,
            domain: self.domain,
            generated_domain: self.generated_domain,
            exposed_ports: self.exposed_ports,
            port_mappings: self.port_mappings,
            buildpack: self.buildpack,
            env_vars: self.env_vars,
            volumes: self.volumes,
            created_at: existing.map(|a| a.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

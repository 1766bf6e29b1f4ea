//! Build configuration and results

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Nixpacks buildpack configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NixpacksConfig {
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub start_command: Option<String>,
    /// Extra `--env` values passed to nixpacks
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

fn default_static_build_command() -> String {
    "npm run build".to_string()
}

fn default_static_output_dir() -> String {
    "dist".to_string()
}

/// Static site configuration: node build stage served by nginx
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_static_build_command")]
    pub build_command: String,
    #[serde(default = "default_static_output_dir")]
    pub output_dir: String,
    /// Path inside the repository of an nginx server config
    #[serde(default)]
    pub nginx_config: Option<String>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            build_command: default_static_build_command(),
            output_dir: default_static_output_dir(),
            nginx_config: None,
        }
    }
}

fn default_dockerfile_path() -> String {
    "Dockerfile".to_string()
}

/// Build from a Dockerfile already in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileConfig {
    #[serde(default = "default_dockerfile_path")]
    pub dockerfile_path: String,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for DockerfileConfig {
    fn default() -> Self {
        Self {
            dockerfile_path: default_dockerfile_path(),
            build_args: BTreeMap::new(),
            target: None,
        }
    }
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

/// Build through docker-compose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_compose_file")]
    pub compose_file: String,
    #[serde(default)]
    pub service: Option<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            service: None,
        }
    }
}

/// Buildpack selection. The variant and its config always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum BuildpackConfig {
    Nixpacks(NixpacksConfig),
    Static(StaticConfig),
    Dockerfile(DockerfileConfig),
    DockerCompose(ComposeConfig),
}

impl Default for BuildpackConfig {
    fn default() -> Self {
        BuildpackConfig::Nixpacks(NixpacksConfig::default())
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !blank(v))
}

fn check_relative(field: &str, value: &str) -> Result<(), EngineError> {
    if value.starts_with('/') || value.split('/').any(|part| part == "..") {
        return Err(EngineError::ValidationError(format!(
            "{} must be a path inside the repository: {}",
            field, value
        )));
    }
    Ok(())
}

fn check_keys(field: &str, map: &BTreeMap<String, String>) -> Result<(), EngineError> {
    for key in map.keys() {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !key.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(EngineError::ValidationError(format!(
                "invalid {} name: {:?}",
                field, key
            )));
        }
    }
    Ok(())
}

impl BuildpackConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BuildpackConfig::Nixpacks(_) => "nixpacks",
            BuildpackConfig::Static(_) => "static",
            BuildpackConfig::Dockerfile(_) => "dockerfile",
            BuildpackConfig::DockerCompose(_) => "docker_compose",
        }
    }

    /// Validate the config, filling blank fields with their defaults.
    pub fn normalized(&self) -> Result<BuildpackConfig, EngineError> {
        match self {
            BuildpackConfig::Nixpacks(config) => {
                check_keys("nixpacks variable", &config.variables)?;
                Ok(BuildpackConfig::Nixpacks(NixpacksConfig {
                    install_command: non_blank(config.install_command.clone()),
                    build_command: non_blank(config.build_command.clone()),
                    start_command: non_blank(config.start_command.clone()),
                    variables: config.variables.clone(),
                }))
            }
            BuildpackConfig::Static(config) => {
                let mut config = config.clone();
                if blank(&config.build_command) {
                    config.build_command = default_static_build_command();
                }
                if blank(&config.output_dir) {
                    config.output_dir = default_static_output_dir();
                }
                config.nginx_config = non_blank(config.nginx_config);
                check_relative("output_dir", &config.output_dir)?;
                if let Some(nginx) = &config.nginx_config {
                    check_relative("nginx_config", nginx)?;
                }
                Ok(BuildpackConfig::Static(config))
            }
            BuildpackConfig::Dockerfile(config) => {
                let mut config = config.clone();
                if blank(&config.dockerfile_path) {
                    config.dockerfile_path = default_dockerfile_path();
                }
                config.target = non_blank(config.target);
                check_relative("dockerfile_path", &config.dockerfile_path)?;
                check_keys("build argument", &config.build_args)?;
                Ok(BuildpackConfig::Dockerfile(config))
            }
            BuildpackConfig::DockerCompose(config) => {
                let mut config = config.clone();
                if blank(&config.compose_file) {
                    config.compose_file = default_compose_file();
                }
                config.service = non_blank(config.service);
                check_relative("compose_file", &config.compose_file)?;
                Ok(BuildpackConfig::DockerCompose(config))
            }
        }
    }
}

/// Receives build output chunks as they arrive.
pub type LogSink = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// One image build request
#[derive(Clone)]
pub struct BuildSpec {
    pub id: String,
    pub git_repo: String,
    pub git_branch: Option<String>,
    pub context_root: Option<String>,
    pub buildpack: BuildpackConfig,
    pub environment: BTreeMap<String, String>,
    pub image_tag: String,
    pub log_sink: Option<LogSink>,
}

impl fmt::Debug for BuildSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSpec")
            .field("id", &self.id)
            .field("git_repo", &self.git_repo)
            .field("git_branch", &self.git_branch)
            .field("context_root", &self.context_root)
            .field("buildpack", &self.buildpack.kind())
            .field("image_tag", &self.image_tag)
            .finish_non_exhaustive()
    }
}

/// Outcome of a build that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub success: bool,
    pub image_tag: String,
    pub build_logs: String,
    pub error: Option<String>,
}

//! Route management and the file-provider configuration

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::proxy::{ProxyRoute, RouteRequest, RouteStatus};
use crate::proxy::render::{render_routes, DynamicConfig};
use crate::store::repository::ProxyRouteRepository;
use crate::utils::generate_uuid;

pub const DYNAMIC_CONFIG_FILE: &str = "mooring.json";

/// Owns proxy routes and keeps the proxy's dynamic config file in sync with
/// the active set.
pub struct ProxyConfigurator {
    repo: Arc<dyn ProxyRouteRepository>,
    config_dir: PathBuf,
}

impl ProxyConfigurator {
    pub fn new(repo: Arc<dyn ProxyRouteRepository>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            config_dir: config_dir.into(),
        }
    }

    fn dynamic_dir(&self) -> Dir {
        Dir::new(&self.config_dir).subdir("dynamic")
    }

    /// Path of the rendered configuration
    pub fn config_file(&self) -> File {
        self.dynamic_dir().file(DYNAMIC_CONFIG_FILE)
    }

    /// Re-render every active route and replace the config file.
    pub async fn render(&self) -> Result<DynamicConfig, EngineError> {
        let routes = self.repo.list().await?;
        let config = render_routes(&routes);

        self.dynamic_dir().create().await.map_err(|e| {
            EngineError::ProxyError(format!("failed to create proxy config directory: {}", e))
        })?;
        let file = self.config_file();
        file.write_json(&config).await.map_err(|e| {
            EngineError::ProxyError(format!(
                "failed to write {}: {}",
                file.path().display(),
                e
            ))
        })?;

        debug!(
            routers = config.http.routers.len(),
            path = %file.path().display(),
            "Rendered proxy configuration"
        );
        Ok(config)
    }

    pub async fn get_route(&self, id: &str) -> Result<ProxyRoute, EngineError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("proxy route {}", id)))
    }

    pub async fn list_routes(&self) -> Result<Vec<ProxyRoute>, EngineError> {
        self.repo.list().await
    }

    pub async fn create_route(&self, request: RouteRequest) -> Result<ProxyRoute, EngineError> {
        validate_request(&request)?;
        self.check_conflicts(None, &request).await?;

        let now = Utc::now();
        let route = ProxyRoute {
            id: generate_uuid(),
            name: request.name,
            service_name: request.service_name,
            container_id: request.container_id,
            hostnames: request.hostnames,
            target_url: request.target_url,
            port: request.port,
            protocol: request.protocol,
            path_prefix: request.path_prefix.filter(|p| !p.is_empty()),
            strip_prefix: request.strip_prefix,
            tls: request.tls,
            health_check: request.health_check,
            status: request.status,
            created_at: now,
            updated_at: now,
        };

        self.repo.save(&route).await?;
        info!(route_id = %route.id, hostnames = ?route.hostnames, "Created proxy route");
        self.render().await?;
        Ok(route)
    }

    pub async fn update_route(
        &self,
        id: &str,
        request: RouteRequest,
    ) -> Result<ProxyRoute, EngineError> {
        let mut route = self.get_route(id).await?;
        validate_request(&request)?;
        self.check_conflicts(Some(id), &request).await?;

        route.name = request.name;
        route.service_name = request.service_name;
        route.container_id = request.container_id;
        route.hostnames = request.hostnames;
        route.target_url = request.target_url;
        route.port = request.port;
        route.protocol = request.protocol;
        route.path_prefix = request.path_prefix.filter(|p| !p.is_empty());
        route.strip_prefix = request.strip_prefix;
        route.tls = request.tls;
        route.health_check = request.health_check;
        route.status = request.status;
        route.updated_at = Utc::now();

        self.repo.save(&route).await?;
        info!(route_id = %id, "Updated proxy route");
        self.render().await?;
        Ok(route)
    }

    pub async fn delete_route(&self, id: &str) -> Result<(), EngineError> {
        if !self.repo.delete(id).await? {
            return Err(EngineError::NotFound(format!("proxy route {}", id)));
        }
        info!(route_id = %id, "Deleted proxy route");
        self.render().await?;
        Ok(())
    }

    pub async fn activate_route(&self, id: &str) -> Result<ProxyRoute, EngineError> {
        self.set_status(id, RouteStatus::Active).await
    }

    pub async fn deactivate_route(&self, id: &str) -> Result<ProxyRoute, EngineError> {
        self.set_status(id, RouteStatus::Inactive).await
    }

    async fn set_status(&self, id: &str, status: RouteStatus) -> Result<ProxyRoute, EngineError> {
        let mut route = self.get_route(id).await?;
        if route.status != status {
            route.status = status;
            route.updated_at = Utc::now();
            self.repo.save(&route).await?;
            self.render().await?;
        }
        Ok(route)
    }

    /// Reject a hostname and path prefix pair already claimed by another route.
    async fn check_conflicts(
        &self,
        own_id: Option<&str>,
        request: &RouteRequest,
    ) -> Result<(), EngineError> {
        let prefix = request.path_prefix.as_deref().unwrap_or("");
        for existing in self.repo.list().await? {
            if Some(existing.id.as_str()) == own_id {
                continue;
            }
            if existing.path_prefix.as_deref().unwrap_or("") != prefix {
                continue;
            }
            if let Some(host) = request
                .hostnames
                .iter()
                .find(|h| existing.hostnames.iter().any(|e| e.eq_ignore_ascii_case(h)))
            {
                return Err(EngineError::ValidationError(format!(
                    "hostname {} is already routed by {}",
                    host, existing.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_hostname(host: &str) -> Result<(), EngineError> {
    let valid = !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '*')
        });
    if !valid {
        return Err(EngineError::ValidationError(format!(
            "invalid hostname: {:?}",
            host
        )));
    }
    Ok(())
}

/// Validate the caller-supplied fields of a route.
pub fn validate_request(request: &RouteRequest) -> Result<(), EngineError> {
    if request.name.trim().is_empty() {
        return Err(EngineError::ValidationError("route name is required".to_string()));
    }
    if request.service_name.trim().is_empty() {
        return Err(EngineError::ValidationError(
            "service name is required".to_string(),
        ));
    }
    if request.hostnames.is_empty() {
        return Err(EngineError::ValidationError(
            "at least one hostname is required".to_string(),
        ));
    }
    for host in &request.hostnames {
        validate_hostname(host)?;
    }

    let target = url::Url::parse(&request.target_url).map_err(|e| {
        EngineError::ValidationError(format!("invalid target url {}: {}", request.target_url, e))
    })?;
    if !matches!(target.scheme(), "http" | "https") || target.host_str().is_none() {
        return Err(EngineError::ValidationError(format!(
            "target url must be http(s) with a host: {}",
            request.target_url
        )));
    }

    if request.port == 0 {
        return Err(EngineError::ValidationError("port must be non-zero".to_string()));
    }
    if let Some(prefix) = request.path_prefix.as_deref().filter(|p| !p.is_empty()) {
        if !prefix.starts_with('/') || prefix.contains('`') {
            return Err(EngineError::ValidationError(format!(
                "invalid path prefix: {:?}",
                prefix
            )));
        }
    }
    if let Some(hc) = &request.health_check {
        if !hc.path.starts_with('/') {
            return Err(EngineError::ValidationError(format!(
                "health check path must start with '/': {:?}",
                hc.path
            )));
        }
    }
    Ok(())
}

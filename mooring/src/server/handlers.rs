//! HTTP request handlers

use std::sync::Arc;

use api_models::models::{
    ActionResponse, DeploymentAccepted, ErrorResponse, HealthResponse, ListResponse,
    LiveLogsQuery, LogsResponse, VersionResponse,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::containers::manager::{ContainerError, LogStream};
use crate::errors::EngineError;
use crate::models::application::ApplicationRequest;
use crate::models::database::DatabaseEngine;
use crate::models::deployment::CreateDeployment;
use crate::models::proxy::RouteRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Engine errors rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl From<ContainerError> for ApiError {
    fn from(err: ContainerError) -> Self {
        ApiError(err.into())
    }
}

/// Status code for an engine error
pub fn status_code(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ContainerError(e) if e.is_not_found() => StatusCode::NOT_FOUND,
        EngineError::ValidationError(_) | EngineError::JsonError(_) => StatusCode::BAD_REQUEST,
        EngineError::TransitionError(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = status_code(&self.0);
        if code.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: code.as_u16(),
        };
        (code, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mooring".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

// ================================ APPLICATIONS =================================

/// Insert or replace an application record
pub async fn put_application_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<ApplicationRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(EngineError::ValidationError("application name is required".to_string()).into());
    }
    let existing = state.applications.get(&id).await?;
    let application = request.into_application(&id, existing.as_ref());
    state.applications.save(&application).await?;
    info!(application_id = %id, "Saved application");
    Ok(Json(application))
}

pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(application_id): Path<String>,
    Json(mut cmd): Json<CreateDeployment>,
) -> ApiResult<impl IntoResponse> {
    cmd.application_id = application_id;
    let (deployment, _task) = state.executor.create_and_execute(cmd).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DeploymentAccepted {
            id: deployment.id,
            application_id: deployment.application_id,
            deployment_number: deployment.deployment_number,
            image_tag: deployment.image_tag,
            status: deployment.status.to_string(),
            created_at: deployment.created_at,
        }),
    ))
}

pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
    Path(application_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deployments = state.deployments.list_by_application(&application_id).await?;
    Ok(Json(ListResponse::from(deployments)))
}

pub async fn recreate_handler(
    State(state): State<Arc<ServerState>>,
    Path(application_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deployment = state.executor.recreate_container(&application_id).await?;
    Ok(Json(deployment))
}

// ================================= DEPLOYMENTS =================================

pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.deployments.get(&id).await?))
}

pub async fn delete_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.deployments.delete_deployment(&id).await?;
    Ok(Json(ActionResponse::ok(format!("deployment {} deleted", id))))
}

pub async fn cancel_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.deployments.cancel(&id).await?))
}

pub async fn stop_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.deployments.stop(&id).await?))
}

/// Buffered build and deploy logs
pub async fn logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deployment = state.deployments.get(&id).await?;
    Ok(Json(LogsResponse {
        deployment_id: deployment.id,
        status: deployment.status.to_string(),
        build_logs: deployment.build_logs,
        deploy_logs: deployment.deploy_logs,
    }))
}

/// Container output as a chunked plain-text body
pub async fn live_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<LiveLogsQuery>,
) -> ApiResult<Response> {
    let deployment = state.deployments.get(&id).await?;
    let container_id = deployment
        .container_id
        .filter(|c| !c.is_empty())
        .ok_or_else(|| EngineError::ValidationError(format!("deployment {} has no container", id)))?;

    let logs = state.containers.stream_logs(&container_id, query.follow).await?;
    let body = Body::from_stream(log_chunks(logs));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

/// Read the log stream in chunks until EOF or the first read error.
fn log_chunks(
    logs: LogStream,
) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    stream::unfold(Some(logs), |reader| async move {
        let Some(mut reader) = reader else {
            return None;
        };
        let mut buf = vec![0u8; 4096];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

// ================================= PROXY ROUTES ================================

pub async fn list_routes_handler(
    State(state): State<Arc<ServerState>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ListResponse::from(state.proxy.list_routes().await?)))
}

pub async fn create_route_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RouteRequest>,
) -> ApiResult<impl IntoResponse> {
    let route = state.proxy.create_route(request).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn update_route_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<RouteRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.proxy.update_route(&id, request).await?))
}

pub async fn delete_route_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.proxy.delete_route(&id).await?;
    Ok(Json(ActionResponse::ok(format!("proxy route {} deleted", id))))
}

// ================================== DATABASES ==================================

/// Database creation request
#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub name: String,
    pub project_id: String,
    pub environment_id: String,
    pub engine: DatabaseEngine,
}

pub async fn create_database_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateDatabaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let database = state
        .databases
        .create(
            &request.name,
            &request.project_id,
            &request.environment_id,
            request.engine,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(database)))
}

pub async fn list_databases_handler(
    State(state): State<Arc<ServerState>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ListResponse::from(state.databases.list().await?)))
}

pub async fn get_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.databases.get(&id).await?))
}

pub async fn deploy_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.databases.deploy(&id).await?))
}

pub async fn start_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.databases.start(&id).await?))
}

pub async fn stop_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.databases.stop(&id).await?))
}

pub async fn restart_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.databases.restart(&id).await?))
}

pub async fn delete_database_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.databases.delete(&id).await?;
    Ok(Json(ActionResponse::ok(format!("database {} deleted", id))))
}

//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::EngineError;
use crate::server::handlers::*;
use crate::server::state::ServerState;

/// Build the API router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Applications
        .route("/applications/{id}", put(put_application_handler))
        .route(
            "/applications/{id}/deployments",
            post(create_deployment_handler).get(list_deployments_handler),
        )
        .route("/applications/{id}/recreate", post(recreate_handler))
        // Deployments
        .route(
            "/deployments/{id}",
            get(get_deployment_handler).delete(delete_deployment_handler),
        )
        .route("/deployments/{id}/cancel", post(cancel_deployment_handler))
        .route("/deployments/{id}/stop", post(stop_deployment_handler))
        .route("/deployments/{id}/logs", get(logs_handler))
        .route("/deployments/{id}/logs/live", get(live_logs_handler))
        // Proxy routes
        .route(
            "/proxy/routes",
            get(list_routes_handler).post(create_route_handler),
        )
        .route(
            "/proxy/routes/{id}",
            put(update_route_handler).delete(delete_route_handler),
        )
        // Databases
        .route(
            "/databases",
            get(list_databases_handler).post(create_database_handler),
        )
        .route(
            "/databases/{id}",
            get(get_database_handler).delete(delete_database_handler),
        )
        .route("/databases/{id}/deploy", post(deploy_database_handler))
        .route("/databases/{id}/start", post(start_database_handler))
        .route("/databases/{id}/stop", post(stop_database_handler))
        .route("/databases/{id}/restart", post(restart_database_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), EngineError>>, EngineError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| EngineError::ServerError(e.to_string()))
    });

    Ok(handle)
}

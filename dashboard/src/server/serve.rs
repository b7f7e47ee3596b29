//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DashboardError;
use crate::server::handlers::*;
use crate::server::state::ServerState;

/// Build the API router
pub fn build_router(state: Arc<ServerState>) -> Router {
    const APP: &str = "/api/applications/{id}";

    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Auth
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/logout", post(logout_handler))
        // Applications
        .route(
            "/api/applications",
            get(list_applications_handler).post(deploy_handler),
        )
        .route(APP, delete(remove_handler))
        .route(&format!("{APP}/start"), post(start_handler))
        .route(&format!("{APP}/stop"), post(stop_handler))
        .route(&format!("{APP}/restart"), post(restart_handler))
        .route(&format!("{APP}/logs"), get(logs_handler))
        // Environment variables
        .route(
            &format!("{APP}/env-vars"),
            get(list_env_vars_handler).post(set_env_var_handler),
        )
        .route(&format!("{APP}/env-vars/{{key}}"), delete(delete_env_var_handler))
        // Error log and deployment status
        .route(
            &format!("{APP}/errors"),
            get(list_errors_handler).delete(clear_errors_handler),
        )
        .route(
            &format!("{APP}/deployment-status"),
            get(deployment_status_handler).delete(clear_deployment_status_handler),
        )
        // Database
        .route(&format!("{APP}/database/status"), get(database_status_handler))
        .route(&format!("{APP}/database/migrations"), get(migrations_handler))
        .route(
            &format!("{APP}/database/{{action}}"),
            post(database_action_handler),
        )
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DashboardError>>, DashboardError> {
    let app = build_router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DashboardError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DashboardError::ServerError(e.to_string()))
    });

    Ok(handle)
}

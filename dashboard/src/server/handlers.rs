//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use openapi_server::models::{
    ApplicationsResponse, DatabaseActionResponse, DatabaseStatusResponse, DeployRequest,
    DeployResponse, EnvVarsResponse, ErrorsResponse, HealthResponse, LoginRequest, LoginResponse,
    LogsQuery, LogsResponse, MeResponse, MessageResponse, MigrationsResponse, SetEnvVarRequest,
    SetEnvVarResponse,
};
use serde::Serialize;
use tracing::info;

use crate::authn::users::Principal;
use crate::deploy::fsm::DeploymentStatus;
use crate::errors::DashboardError;
use crate::server::auth::Developer;
use crate::server::state::ServerState;
use crate::services::applications::DEFAULT_LOG_LINES;
use crate::services::database::DatabaseAction;
use crate::storage::registry::NewApp;
use crate::utils::version_info;

type ApiResult<T> = Result<Json<T>, DashboardError>;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ================================ HEALTH ================================ //

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deckhand".to_string(),
        version: version_info().version,
    })
}

// ================================= AUTH ================================= //

pub async fn login_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let (Some(username), Some(password)) =
        (non_empty(request.username), non_empty(request.password))
    else {
        return Err(DashboardError::Validation(
            "Username and password required".to_string(),
        ));
    };

    let principal = state.users.authenticate(&username, &password)?;
    let token = state.tokens.issue(&principal)?;
    info!("User {} logged in", principal.username);

    Ok(Json(LoginResponse {
        token,
        user: (&principal).into(),
    }))
}

pub async fn me_handler(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        user: (&principal).into(),
    })
}

/// Tokens are stateless; the client drops its copy
pub async fn logout_handler(_principal: Principal) -> Json<MessageResponse> {
    Json(MessageResponse::new("Logged out successfully"))
}

// ============================= APPLICATIONS ============================= //

pub async fn list_applications_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
) -> ApiResult<ApplicationsResponse> {
    let applications = state.applications.list().await?;
    Ok(Json(ApplicationsResponse { applications }))
}

pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Developer(principal): Developer,
    Json(request): Json<DeployRequest>,
) -> ApiResult<DeployResponse> {
    let (Some(name), Some(repository)) = (non_empty(request.name), non_empty(request.repository))
    else {
        return Err(DashboardError::Validation(
            "Name and repository are required".to_string(),
        ));
    };

    info!("{} requested deployment of {}", principal.username, name);
    let summary = state
        .orchestrator
        .deploy(NewApp {
            name,
            repository,
            branch: non_empty(request.branch)
                .unwrap_or_else(|| state.deploy_defaults.default_branch.clone()),
            port: request.port.unwrap_or(state.deploy_defaults.default_port),
        })
        .await?;

    Ok(Json(DeployResponse {
        message: "Application deployed successfully".to_string(),
        application: summary,
    }))
}

pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.applications.start(&target).await?;
    Ok(Json(MessageResponse::new("Application started successfully")))
}

pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.applications.stop(&target).await?;
    Ok(Json(MessageResponse::new("Application stopped successfully")))
}

pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.applications.restart(&target).await?;
    Ok(Json(MessageResponse::new("Application restarted successfully")))
}

pub async fn remove_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    if state.orchestrator.guard().is_active(target.name()) {
        return Err(DashboardError::Conflict(format!(
            "A deployment of '{}' is in progress",
            target.name()
        )));
    }
    state.applications.remove(&target).await?;
    Ok(Json(MessageResponse::new("Application removed successfully")))
}

pub async fn logs_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<LogsResponse> {
    let target = state.applications.resolve(&id).await?;
    let lines = query.lines.filter(|n| *n > 0).unwrap_or(DEFAULT_LOG_LINES);
    let logs = state.applications.logs(&target, lines).await?;
    Ok(Json(LogsResponse { logs }))
}

// ========================= ENVIRONMENT VARIABLES ======================== //

pub async fn list_env_vars_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<EnvVarsResponse> {
    let target = state.applications.resolve(&id).await?;
    let variables = state.env.list(target.name()).await;
    Ok(Json(EnvVarsResponse { variables }))
}

pub async fn set_env_var_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
    Json(request): Json<SetEnvVarRequest>,
) -> ApiResult<SetEnvVarResponse> {
    // an empty value is a valid assignment, only a missing one is rejected
    let (Some(key), Some(value)) = (non_empty(request.key), request.value) else {
        return Err(DashboardError::Validation(
            "Key and value are required".to_string(),
        ));
    };

    let target = state.applications.resolve(&id).await?;
    let variable = state.env.set(target.name(), key.trim(), &value).await?;
    Ok(Json(SetEnvVarResponse {
        message: "Environment variable saved successfully".to_string(),
        variable,
    }))
}

pub async fn delete_env_var_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path((id, key)): Path<(String, String)>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.env.delete(target.name(), &key).await?;
    Ok(Json(MessageResponse::new(
        "Environment variable deleted successfully",
    )))
}

// =============================== ERROR LOG ============================== //

pub async fn list_errors_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<ErrorsResponse> {
    let target = state.applications.resolve(&id).await?;
    let errors = state.errors.list(target.name()).await;
    Ok(Json(ErrorsResponse { errors }))
}

pub async fn clear_errors_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.errors.clear(target.name()).await?;
    Ok(Json(MessageResponse::new("Errors cleared successfully")))
}

// =========================== DEPLOYMENT STATUS ========================== //

/// Deployment status response
#[derive(Debug, Serialize)]
pub struct DeploymentStatusResponse {
    pub status: DeploymentStatus,
}

pub async fn deployment_status_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<DeploymentStatusResponse> {
    let target = state.applications.resolve(&id).await?;
    let status = state.status.get(target.name()).await;
    Ok(Json(DeploymentStatusResponse { status }))
}

pub async fn clear_deployment_status_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let target = state.applications.resolve(&id).await?;
    state.status.clear(target.name()).await?;
    Ok(Json(MessageResponse::new(
        "Deployment status cleared successfully",
    )))
}

// =============================== DATABASE =============================== //

pub async fn database_status_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<DatabaseStatusResponse> {
    let target = state.applications.resolve(&id).await?;
    let database = state.database.status(target.name()).await;
    Ok(Json(DatabaseStatusResponse {
        success: true,
        database,
    }))
}

pub async fn migrations_handler(
    State(state): State<Arc<ServerState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<MigrationsResponse> {
    let target = state.applications.resolve(&id).await?;
    let migrations = state
        .database
        .migrations(target.name())
        .await
        .map_err(|e| DashboardError::Database(format!("Failed to list migrations: {}", e)))?;
    Ok(Json(MigrationsResponse {
        success: true,
        migrations,
    }))
}

pub async fn database_action_handler(
    State(state): State<Arc<ServerState>>,
    _developer: Developer,
    Path((id, action)): Path<(String, String)>,
) -> ApiResult<DatabaseActionResponse> {
    let action: DatabaseAction = action
        .parse()
        .map_err(|_| DashboardError::Validation("Invalid action".to_string()))?;
    let target = state.applications.resolve(&id).await?;
    let response = state.database.execute(target.name(), action).await?;
    Ok(Json(response))
}

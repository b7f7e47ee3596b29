//! Request authentication

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use crate::authn::users::Principal;
use crate::errors::DashboardError;
use crate::server::state::ServerState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Arc<ServerState>> for Principal {
    type Rejection = DashboardError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| DashboardError::Unauthorized("No token provided".to_string()))?;

        state.tokens.verify(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            DashboardError::Unauthorized("Invalid or expired token".to_string())
        })
    }
}

/// A user allowed to change applications (admin or developer)
#[derive(Debug, Clone)]
pub struct Developer(pub Principal);

impl FromRequestParts<Arc<ServerState>> for Developer {
    type Rejection = DashboardError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.role.can_modify() {
            return Err(DashboardError::Forbidden(
                "Developer access required".to_string(),
            ));
        }
        Ok(Developer(principal))
    }
}

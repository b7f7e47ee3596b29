//! Users, roles and password hashes

use std::fmt;
use std::str::FromStr;

use openapi_server::models::UserInfo;
use serde::{Deserialize, Serialize};

use crate::errors::DashboardError;
use crate::storage::settings::UserSettings;

/// What a user may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Developer => "developer",
            Role::Viewer => "viewer",
        }
    }

    /// Admins and developers may change applications
    pub fn can_modify(&self) -> bool {
        matches!(self, Role::Admin | Role::Developer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "developer" => Ok(Role::Developer),
            "viewer" => Ok(Role::Viewer),
            other => Err(DashboardError::ConfigError(format!("Unknown role: {}", other))),
        }
    }
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl From<&Principal> for UserInfo {
    fn from(principal: &Principal) -> Self {
        UserInfo {
            id: principal.id.clone(),
            username: principal.username.clone(),
            role: principal.role.to_string(),
        }
    }
}

/// bcrypt hash of `password` at the default cost
pub fn hash_password(password: &str) -> Result<String, DashboardError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| DashboardError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check `password` against a bcrypt hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[derive(Debug, Clone)]
struct User {
    principal: Principal,
    password_hash: String,
}

/// Users known to the dashboard
#[derive(Debug, Clone)]
pub struct UserStore {
    users: Vec<User>,
}

impl UserStore {
    pub fn new(users: &[UserSettings]) -> Result<Self, DashboardError> {
        let users = users
            .iter()
            .map(|u| {
                Ok(User {
                    principal: Principal {
                        id: u.id.clone(),
                        username: u.username.clone(),
                        role: u.role.parse()?,
                    },
                    password_hash: u.password_hash.clone(),
                })
            })
            .collect::<Result<Vec<_>, DashboardError>>()?;
        Ok(Self { users })
    }

    /// Check a username and password
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Principal, DashboardError> {
        self.users
            .iter()
            .find(|u| u.principal.username == username)
            .filter(|u| verify_password(password, &u.password_hash))
            .map(|u| u.principal.clone())
            .ok_or_else(|| DashboardError::Unauthorized("Invalid credentials".to_string()))
    }

    /// Whether the built-in `admin` / `admin123` account is still active
    pub fn has_default_admin(&self) -> bool {
        self.authenticate("admin", "admin123").is_ok()
    }
}

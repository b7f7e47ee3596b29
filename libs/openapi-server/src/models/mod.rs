//! Dashboard API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ================================ AUTH ================================== //

/// Login request. Fields are optional so that missing ones map to 400.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub role: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Current user response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserInfo,
}

// ============================= APPLICATIONS ============================= //

/// Deploy request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Outcome of one deployment attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub id: String,
    pub name: String,
    pub path: String,
    pub port: u16,
    /// `online` when no step failed, `error` otherwise
    pub status: String,
    pub has_errors: bool,
}

/// Deploy response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub message: String,
    pub application: DeploymentSummary,
}

/// One row of the application list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub uptime: i64,
    pub restarts: u64,
    pub cpu: f64,
    pub memory: u64,
}

/// Application list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationsResponse {
    pub applications: Vec<ApplicationSummary>,
}

/// Log query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub lines: Option<usize>,
}

/// A single line from the process manager's log files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub id: String,
    pub timestamp: String,
    pub app: String,
    pub level: String,
    pub message: String,
}

/// Log response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<LogLine>,
}

// ========================= ENVIRONMENT VARIABLES ======================== //

/// A `.env` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Environment variable list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarsResponse {
    pub variables: Vec<EnvVar>,
}

/// Set environment variable request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetEnvVarRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Set environment variable response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEnvVarResponse {
    pub message: String,
    pub variable: EnvVar,
}

// =============================== ERROR LOG ============================== //

/// Error log category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Build,
    Deployment,
    Runtime,
    System,
}

/// A recorded application error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub category: ErrorCategory,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error log response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorLogEntry>,
}

// =============================== DATABASE =============================== //

/// ORM/database setup detected for an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub has_database: bool,
    pub db_type: Option<String>,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub has_drizzle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

/// Database status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStatusResponse {
    pub success: bool,
    pub database: DatabaseInfo,
}

/// A migration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// Migration list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsResponse {
    pub success: bool,
    pub migrations: Vec<Migration>,
}

/// Database action response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

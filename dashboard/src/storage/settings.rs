//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Optional directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Root directory applications are deployed into
    #[serde(default = "default_apps_dir")]
    pub apps_dir: PathBuf,

    /// Command executor limits
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Deployment defaults
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthSettings,
}

fn default_apps_dir() -> PathBuf {
    PathBuf::from("/var/www")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            apps_dir: default_apps_dir(),
            executor: ExecutorSettings::default(),
            deploy: DeploySettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Command executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Wall-clock timeout per command
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum captured bytes per output stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Programs a command line may start with
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

pub fn default_allowed_commands() -> Vec<String> {
    [
        "pm2", "nginx", "certbot", "git", "npm", "npx", "yarn", "pnpm", "node", "systemctl",
        "psql", "mysql", "mongosh", "redis-cli", "ln", "sudo", "openssl", "tail", "mkdir", "rm",
        "mv", "cp", "find",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

/// Deployment defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default = "default_app_port")]
    pub default_port: u16,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_app_port() -> u16 {
    3000
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            default_port: default_app_port(),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for signing tokens. `JWT_SECRET` overrides it.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Known users
    #[serde(default = "default_users")]
    pub users: Vec<UserSettings>,
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

/// bcrypt hash of `admin123`, the password of the built-in administrator
pub const DEFAULT_ADMIN_HASH: &str =
    "$2a$10$KpL/TA8jx5btO.4Zrv.AdOr7lU0GAAamA4AA8opgyBjqo/qqXHL9u";

fn default_users() -> Vec<UserSettings> {
    vec![UserSettings {
        id: "1".to_string(),
        username: "admin".to_string(),
        password_hash: DEFAULT_ADMIN_HASH.to_string(),
        role: "admin".to_string(),
    }]
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            users: default_users(),
        }
    }
}

/// A configured user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub id: String,
    pub username: String,
    /// bcrypt hash as printed by `deckhand --hash-password`
    pub password_hash: String,
    /// admin, developer or viewer
    pub role: String,
}

//! Application configuration options

use std::time::Duration;

use crate::deploy::command::ExecutorOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{AuthSettings, DeploySettings, Settings};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Command executor limits
    pub executor: ExecutorOptions,

    /// Deployment defaults
    pub deploy: DeploySettings,

    /// Users and token signing
    pub auth: AuthSettings,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<Settings> for AppOptions {
    fn from(settings: Settings) -> Self {
        Self {
            layout: StorageLayout::new(settings.apps_dir),
            server: ServerOptions {
                host: settings.server.host,
                port: settings.server.port,
            },
            executor: settings.executor.into(),
            deploy: settings.deploy,
            auth: settings.auth,
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

//! Storage layout of the application root

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Name of the registry file under the application root
pub const REGISTRY_FILE: &str = ".app-registry.json";

/// Directory holding one deployment status file per application name
pub const STATUS_DIR: &str = ".deployment-status";

/// Per-application error log
pub const ERRORS_FILE: &str = ".errors.json";

/// Per-application environment file
pub const ENV_FILE: &str = ".env";

/// Node manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Storage layout rooted at the directory applications are deployed into
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all applications
    pub apps_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(apps_dir: impl Into<PathBuf>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
        }
    }

    /// The application root
    pub fn apps_dir(&self) -> Dir {
        Dir::new(self.apps_dir.clone())
    }

    /// The registry file
    pub fn registry_file(&self) -> File {
        File::new(self.apps_dir.join(REGISTRY_FILE))
    }

    /// The deployment status directory
    pub fn status_dir(&self) -> Dir {
        Dir::new(self.apps_dir.join(STATUS_DIR))
    }

    /// Deployment status file for an application name
    pub fn status_file(&self, app_name: &str) -> File {
        File::new(
            self.apps_dir
                .join(STATUS_DIR)
                .join(format!("{}.json", app_name)),
        )
    }

    /// Directory of an application
    pub fn app_dir(&self, app_name: &str) -> Dir {
        Dir::new(self.apps_dir.join(app_name))
    }

    /// Error log of an application
    pub fn errors_file(&self, app_name: &str) -> File {
        self.app_dir(app_name).file(ERRORS_FILE)
    }

    /// Environment file of an application
    pub fn env_file(&self, app_name: &str) -> File {
        self.app_dir(app_name).file(ENV_FILE)
    }

    /// Node manifest of an application
    pub fn manifest_file(&self, app_name: &str) -> File {
        self.app_dir(app_name).file(MANIFEST_FILE)
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::DashboardError> {
        self.apps_dir().create().await?;
        self.status_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/var/www")
    }
}

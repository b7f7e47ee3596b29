//! Node manifest and npm commands

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deploy::command::CommandSpec;
use crate::errors::DashboardError;
use crate::filesys::dir::Dir;
use crate::storage::layout::MANIFEST_FILE;

/// Start script written when a checkout is unavailable
pub const PLACEHOLDER_START: &str =
    "echo \"Application failed to deploy. Check errors for details.\" && exit 1";

/// The parts of `package.json` the dashboard looks at
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Read `package.json` from an application directory
    pub async fn read(app_dir: &Dir) -> Result<Self, DashboardError> {
        app_dir.file(MANIFEST_FILE).read_json().await
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.scripts.get(script).is_some_and(|s| !s.is_empty())
    }

    /// `"type": "module"`
    pub fn is_module(&self) -> bool {
        self.module_type.as_deref() == Some("module")
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn has_dev_dependency(&self, name: &str) -> bool {
        self.dev_dependencies.contains_key(name)
    }

    /// A manifest whose start script fails immediately
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: Some("1.0.0".to_string()),
            scripts: BTreeMap::from([("start".to_string(), PLACEHOLDER_START.to_string())]),
            ..Default::default()
        }
    }

    pub async fn write(&self, app_dir: &Dir) -> Result<(), DashboardError> {
        app_dir.file(MANIFEST_FILE).write_json(self).await
    }
}

/// `npm install --production --prefix <dir>`
pub fn install(app_dir: &Path) -> CommandSpec {
    CommandSpec::new("npm")
        .args(["install", "--production", "--prefix"])
        .arg(app_dir.to_string_lossy())
        .require_prefix("npm")
}

/// `npm run build --prefix <dir>`
pub fn build(app_dir: &Path) -> CommandSpec {
    CommandSpec::new("npm")
        .args(["run", "build", "--prefix"])
        .arg(app_dir.to_string_lossy())
        .require_prefix("npm")
}

/// `npm run <script>` inside the application directory
pub fn run_script(app_dir: &Path, script: &str) -> CommandSpec {
    CommandSpec::new("npm")
        .args(["run", script])
        .current_dir(app_dir)
        .require_prefix("npm")
}

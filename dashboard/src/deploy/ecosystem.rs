//! PM2 ecosystem config files
//!
//! Each application gets an `ecosystem.config.js` (or `.cjs` when its
//! manifest declares ES modules) holding a single app entry.

use serde::Serialize;
use tracing::{info, warn};

use crate::deploy::npm::PackageManifest;
use crate::errors::DashboardError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

const CONFIG_STEM: &str = "ecosystem.config";
const ENV_FILE_ENTRY: &str = "env_file: '.env',";

/// Environment passed to a deployed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcosystemEnv {
    #[serde(rename = "PORT")]
    pub port: u16,
    #[serde(rename = "NODE_ENV")]
    pub node_env: String,
}

/// One entry of `apps`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcosystemApp {
    pub name: String,
    pub script: String,
    pub args: String,
    pub cwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<EcosystemEnv>,
    pub env_file: String,
    pub instances: u32,
    pub autorestart: bool,
    pub watch: bool,
    pub max_memory_restart: String,
}

impl EcosystemApp {
    pub fn new(name: &str, app_dir: &Dir, script: &str, args: &str) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_string(),
            args: args.to_string(),
            cwd: app_dir.path().to_string_lossy().into_owned(),
            env: None,
            env_file: ".env".to_string(),
            instances: 1,
            autorestart: true,
            watch: false,
            max_memory_restart: "1G".to_string(),
        }
    }

    /// Production environment listening on `port`
    pub fn with_port(mut self, port: u16) -> Self {
        self.env = Some(EcosystemEnv {
            port,
            node_env: "production".to_string(),
        });
        self
    }

    /// Start command inferred from a manifest: `npm start`, else
    /// `node <main>`, else `node index.js`
    pub fn inferred(name: &str, app_dir: &Dir, manifest: &PackageManifest) -> Self {
        if manifest.has_script("start") {
            Self::new(name, app_dir, "npm", "start")
        } else if let Some(main) = manifest.main.as_deref().filter(|m| !m.is_empty()) {
            Self::new(name, app_dir, "node", main)
        } else {
            Self::new(name, app_dir, "node", "index.js")
        }
    }
}

#[derive(Serialize)]
struct EcosystemConfig<'a> {
    apps: [&'a EcosystemApp; 1],
}

/// `module.exports = <json>`
pub fn render(app: &EcosystemApp) -> Result<String, DashboardError> {
    let json = serde_json::to_string_pretty(&EcosystemConfig { apps: [app] })?;
    Ok(format!("module.exports = {}", json))
}

/// Config path for the manifest's module system
pub fn config_file(app_dir: &Dir, is_module: bool) -> File {
    let ext = if is_module { "cjs" } else { "js" };
    app_dir.file(&format!("{}.{}", CONFIG_STEM, ext))
}

/// The existing config, `.js` first
pub async fn find(app_dir: &Dir) -> Option<File> {
    for is_module in [false, true] {
        let file = config_file(app_dir, is_module);
        if file.exists().await {
            return Some(file);
        }
    }
    None
}

async fn is_module(app_dir: &Dir) -> bool {
    PackageManifest::read(app_dir)
        .await
        .map(|m| m.is_module())
        .unwrap_or(false)
}

/// Write the config for `app`, choosing the extension from the manifest
pub async fn write(app_dir: &Dir, app: &EcosystemApp) -> Result<File, DashboardError> {
    let file = config_file(app_dir, is_module(app_dir).await);
    file.write_string(&render(app)?).await?;
    Ok(file)
}

/// The existing config, or a freshly generated one
pub async fn ensure(app_dir: &Dir, name: &str) -> Result<File, DashboardError> {
    if let Some(existing) = find(app_dir).await {
        return Ok(existing);
    }

    let manifest = match PackageManifest::read(app_dir).await {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("Could not read package.json for {}: {}", name, e);
            PackageManifest::default()
        }
    };

    let file = config_file(app_dir, manifest.is_module());
    let app = EcosystemApp::inferred(name, app_dir, &manifest);
    file.write_string(&render(&app)?).await?;
    info!("Created {} for {}", file.path().display(), name);
    Ok(file)
}

/// Insert `env_file: '.env'` at the top of the first app entry
fn inject_env_file(contents: &str) -> Option<String> {
    let start = contents.find("apps")?;
    let mut rest = contents[start + "apps".len()..].char_indices().peekable();

    let mut expect = [':', '[', '{'].into_iter().peekable();
    // the key may be quoted
    if let Some((_, c)) = rest.peek() {
        if *c == '"' || *c == '\'' {
            rest.next();
        }
    }
    for (i, c) in rest {
        if c.is_whitespace() {
            continue;
        }
        match expect.next() {
            Some(wanted) if wanted == c => {
                if expect.peek().is_none() {
                    let at = start + "apps".len() + i + c.len_utf8();
                    return Some(format!(
                        "{}\n      {}{}",
                        &contents[..at],
                        ENV_FILE_ENTRY,
                        &contents[at..]
                    ));
                }
            }
            _ => return None,
        }
    }
    None
}

/// Make sure an existing config loads the `.env` file.
///
/// Failures are logged and otherwise ignored.
pub async fn ensure_env_file_reference(app_dir: &Dir) {
    let Some(file) = find(app_dir).await else {
        return;
    };

    let contents = match file.read_string().await {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Could not read {}: {}", file.path().display(), e);
            return;
        }
    };
    if contents.contains("env_file") {
        return;
    }

    match inject_env_file(&contents) {
        Some(updated) => match file.write_string(&updated).await {
            Ok(()) => info!("Added env_file to {}", file.path().display()),
            Err(e) => warn!("Could not update {}: {}", file.path().display(), e),
        },
        None => warn!("No apps entry found in {}", file.path().display()),
    }
}

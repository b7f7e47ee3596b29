//! Drizzle database inspection and commands

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use openapi_server::models::{DatabaseActionResponse, DatabaseInfo, Migration};
use tokio::fs;
use tracing::info;

use crate::deploy::command::{CommandRunner, CommandSpec};
use crate::deploy::npm::{self, PackageManifest};
use crate::errors::DashboardError;
use crate::storage::env_file;
use crate::storage::layout::StorageLayout;

const CONFIG_FILES: [&str; 3] = ["drizzle.config.ts", "drizzle.config.js", "drizzle.config.mjs"];
const MIGRATIONS_DIR: &str = "migrations";

/// Commands exposed under `/database/{action}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseAction {
    Push,
    Generate,
    Migrate,
}

impl FromStr for DatabaseAction {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "generate" => Ok(Self::Generate),
            "migrate" => Ok(Self::Migrate),
            other => Err(DashboardError::Validation(format!(
                "Unknown database action: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DatabaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Generate => "generate",
            Self::Migrate => "migrate",
        })
    }
}

impl DatabaseAction {
    fn command(&self, layout: &StorageLayout, app_name: &str) -> CommandSpec {
        let dir = layout.app_dir(app_name);
        match self {
            Self::Push => npm::run_script(dir.path(), "db:push"),
            Self::Generate => drizzle_kit(dir.path(), "generate"),
            Self::Migrate => drizzle_kit(dir.path(), "migrate"),
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::Push => "Database schema synchronized successfully",
            Self::Generate => "Migration generated successfully",
            Self::Migrate => "Migrations applied successfully",
        }
    }
}

fn drizzle_kit(dir: &std::path::Path, subcommand: &str) -> CommandSpec {
    CommandSpec::new("npx")
        .args(["drizzle-kit", subcommand])
        .current_dir(dir)
        .require_prefix("npx")
}

/// Database type implied by a connection string
pub fn detect_db_type(url: &str) -> Option<&'static str> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Some("postgresql")
    } else if url.starts_with("mysql://") {
        Some("mysql")
    } else if url.contains(".db") || url.contains(".sqlite") {
        Some("sqlite")
    } else {
        None
    }
}

/// Hide the password of a connection string
pub fn mask_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                // cannot-be-a-base urls have no password, so this always succeeds
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) if raw.chars().count() > 20 => {
            let chars: Vec<char> = raw.chars().collect();
            let head: String = chars[..10].iter().collect();
            let tail: String = chars[chars.len() - 10..].iter().collect();
            format!("{}...{}", head, tail)
        }
        Err(_) => "***".to_string(),
    }
}

/// Inspects an application's Drizzle setup and runs its database commands
#[derive(Clone)]
pub struct DatabaseService {
    layout: StorageLayout,
    runner: Arc<dyn CommandRunner>,
}

impl DatabaseService {
    pub fn new(layout: StorageLayout, runner: Arc<dyn CommandRunner>) -> Self {
        Self { layout, runner }
    }

    pub async fn status(&self, app_name: &str) -> DatabaseInfo {
        let app_dir = self.layout.app_dir(app_name);
        let manifest = match PackageManifest::read(&app_dir).await {
            Ok(manifest) => manifest,
            Err(_) => return DatabaseInfo::default(),
        };

        let has_drizzle =
            manifest.has_dependency("drizzle-orm") || manifest.has_dev_dependency("drizzle-kit");
        if !has_drizzle {
            return DatabaseInfo::default();
        }

        let mut config_path = None;
        for candidate in CONFIG_FILES {
            if app_dir.file(candidate).exists().await {
                config_path = Some(candidate.to_string());
                break;
            }
        }

        let database_url = match self.layout.env_file(app_name).read_string().await {
            Ok(contents) => env_file::parse(&contents)
                .into_iter()
                .find(|var| var.key == "DATABASE_URL")
                .map(|var| var.value.replace(['\'', '"'], "")),
            Err(_) => None,
        };

        DatabaseInfo {
            has_database: true,
            db_type: database_url
                .as_deref()
                .and_then(detect_db_type)
                .map(str::to_string),
            connected: database_url.as_ref().is_some_and(|u| u.len() > 10),
            database_url: database_url.as_deref().map(mask_database_url),
            has_drizzle: true,
            config_path,
        }
    }

    /// SQL files under `migrations/`, oldest first
    pub async fn migrations(&self, app_name: &str) -> Result<Vec<Migration>, DashboardError> {
        let dir = self.layout.app_dir(app_name).subdir(MIGRATIONS_DIR);
        if !dir.exists().await {
            return Ok(Vec::new());
        }

        let mut migrations = Vec::new();
        for path in dir.list_files().await? {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(id) = file_name.strip_suffix(".sql") else {
                continue;
            };

            let metadata = fs::metadata(&path).await?;
            let created = metadata.created().or_else(|_| metadata.modified())?;

            migrations.push(Migration {
                id: id.to_string(),
                name: file_name.clone(),
                file_path: format!("{}/{}", MIGRATIONS_DIR, file_name),
                created_at: DateTime::<Utc>::from(created),
            });
        }

        migrations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(migrations)
    }

    pub async fn execute(
        &self,
        app_name: &str,
        action: DatabaseAction,
    ) -> Result<DatabaseActionResponse, DashboardError> {
        info!("Running database {} for {}", action, app_name);
        let result = self.runner.run(&action.command(&self.layout, app_name)).await;

        if !result.success {
            return Err(DashboardError::Database(format!(
                "Failed to execute {}: {}",
                action,
                result.error.as_deref().unwrap_or("Command failed")
            )));
        }

        let output = if result.stdout.is_empty() {
            result.stderr
        } else {
            result.stdout
        };
        Ok(DatabaseActionResponse {
            success: true,
            message: action.success_message().to_string(),
            output: Some(output),
        })
    }
}

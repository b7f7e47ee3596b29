//! Application registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::DashboardError;
use crate::storage::layout::StorageLayout;
use crate::utils::generate_uuid;

/// A deployed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    /// Generated once, never changes
    pub id: String,

    /// Unique within the registry
    pub name: String,

    /// Process table id, known after the first successful start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm2_id: Option<u32>,

    pub repository: String,
    pub branch: String,
    pub port: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for a new registry record
#[derive(Debug, Clone)]
pub struct NewApp {
    pub name: String,
    pub repository: String,
    pub branch: String,
    pub port: u16,
}

impl NewApp {
    fn into_record(self) -> AppRecord {
        let now = Utc::now();
        AppRecord {
            id: generate_uuid(),
            name: self.name,
            pm2_id: None,
            repository: self.repository,
            branch: self.branch,
            port: self.port,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Registry of deployed applications, one JSON file under the app root
#[derive(Debug, Clone)]
pub struct Registry {
    layout: StorageLayout,
}

impl Registry {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// All records
    pub async fn list(&self) -> Vec<AppRecord> {
        self.layout.registry_file().read_json_or_default().await
    }

    pub async fn get_by_id(&self, id: &str) -> Option<AppRecord> {
        self.list().await.into_iter().find(|app| app.id == id)
    }

    pub async fn get_by_name(&self, name: &str) -> Option<AppRecord> {
        self.list().await.into_iter().find(|app| app.name == name)
    }

    /// Add a record; the name must not be registered yet
    pub async fn create(&self, app: NewApp) -> Result<AppRecord, DashboardError> {
        let record = app.into_record();
        let stored = record.clone();
        self.layout
            .registry_file()
            .update_json(move |apps: &mut Vec<AppRecord>| {
                if apps.iter().any(|a| a.name == stored.name) {
                    return Err(DashboardError::Conflict(format!(
                        "Application '{}' already exists",
                        stored.name
                    )));
                }
                apps.push(stored);
                Ok(())
            })
            .await?;
        Ok(record)
    }

    /// Swap any record with the same name for a fresh one.
    ///
    /// Returns the records that were dropped together with the new one.
    pub async fn replace(
        &self,
        app: NewApp,
    ) -> Result<(Vec<AppRecord>, AppRecord), DashboardError> {
        let record = app.into_record();
        let stored = record.clone();
        let dropped = self
            .layout
            .registry_file()
            .update_json(move |apps: &mut Vec<AppRecord>| {
                let (dropped, kept): (Vec<_>, Vec<_>) =
                    apps.drain(..).partition(|a| a.name == stored.name);
                *apps = kept;
                apps.push(stored);
                Ok(dropped)
            })
            .await?;

        if !dropped.is_empty() {
            info!("Replaced registry entry for {}", record.name);
        }
        Ok((dropped, record))
    }

    /// Store the process table id; unknown ids are ignored
    pub async fn update_pm2_id(&self, id: &str, pm2_id: u32) -> Result<(), DashboardError> {
        self.layout
            .registry_file()
            .update_json(|apps: &mut Vec<AppRecord>| {
                if let Some(app) = apps.iter_mut().find(|a| a.id == id) {
                    app.pm2_id = Some(pm2_id);
                    app.updated_at = Utc::now();
                }
                Ok(())
            })
            .await
    }

    /// Remove a record
    pub async fn delete(&self, id: &str) -> Result<(), DashboardError> {
        self.layout
            .registry_file()
            .update_json(|apps: &mut Vec<AppRecord>| {
                apps.retain(|a| a.id != id);
                Ok(())
            })
            .await
    }
}

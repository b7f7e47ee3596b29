//! Deployment status store

use chrono::Utc;
use tracing::debug;

use crate::deploy::fsm::{DeploymentStatus, DeploymentStep, StepStatus};
use crate::errors::DashboardError;
use crate::storage::layout::StorageLayout;

/// Persists one [`DeploymentStatus`] per application name
#[derive(Debug, Clone)]
pub struct StatusStore {
    layout: StorageLayout,
}

impl StatusStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Start a fresh record, overwriting any previous one
    pub async fn initialize(&self, app_name: &str) -> Result<(), DashboardError> {
        let file = self.layout.status_file(app_name);
        let _lock = file.lock().await?;
        file.write_json(&DeploymentStatus::default()).await
    }

    /// Record the outcome of a step
    pub async fn update(
        &self,
        app_name: &str,
        step: DeploymentStep,
        status: StepStatus,
        message: Option<&str>,
    ) -> Result<DeploymentStatus, DashboardError> {
        debug!("Deployment {}: {} -> {:?}", app_name, step, status);
        self.layout
            .status_file(app_name)
            .update_json(|record: &mut DeploymentStatus| {
                record.apply(step, status, message, Utc::now());
                Ok(record.clone())
            })
            .await
    }

    /// Current record, or an all-pending default
    pub async fn get(&self, app_name: &str) -> DeploymentStatus {
        self.layout
            .status_file(app_name)
            .read_json_or_default()
            .await
    }

    /// Remove the record
    pub async fn clear(&self, app_name: &str) -> Result<(), DashboardError> {
        self.layout.status_file(app_name).delete().await
    }
}

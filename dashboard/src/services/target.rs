//! Application identifiers as seen by the API

use crate::errors::DashboardError;
use crate::storage::layout::StorageLayout;
use crate::storage::registry::{AppRecord, Registry};

/// Id prefix of applications found on disk but missing from the registry
pub const DISCOVERED_PREFIX: &str = "discovered-";

const MAX_NAME_LEN: usize = 100;

/// Application names double as directory names and PM2 process names
pub fn validate_app_name(name: &str) -> Result<(), DashboardError> {
    if name.is_empty() {
        return Err(DashboardError::Validation(
            "Name and repository are required".to_string(),
        ));
    }
    let valid = name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(DashboardError::Validation(format!(
            "Invalid application name: {}",
            name
        )));
    }
    Ok(())
}

/// A parsed path id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppId {
    /// `discovered-<name>`
    Discovered(String),
    /// Registry id
    Registered(String),
}

impl AppId {
    pub fn parse(raw: &str) -> Result<Self, DashboardError> {
        match raw.strip_prefix(DISCOVERED_PREFIX) {
            Some(name) => {
                validate_app_name(name)
                    .map_err(|_| DashboardError::NotFound("Application not found".to_string()))?;
                Ok(Self::Discovered(name.to_string()))
            }
            None => Ok(Self::Registered(raw.to_string())),
        }
    }

    pub fn discovered(name: &str) -> String {
        format!("{}{}", DISCOVERED_PREFIX, name)
    }
}

/// A resolved application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppTarget {
    Discovered { name: String },
    Registered(AppRecord),
}

impl AppTarget {
    /// Resolve an id against the registry and the application root
    pub async fn resolve(
        id: &AppId,
        registry: &Registry,
        layout: &StorageLayout,
    ) -> Result<Self, DashboardError> {
        match id {
            AppId::Registered(id) => registry
                .get_by_id(id)
                .await
                .map(Self::Registered)
                .ok_or_else(not_found),
            AppId::Discovered(name) => {
                if layout.manifest_file(name).exists().await {
                    Ok(Self::Discovered { name: name.clone() })
                } else {
                    Err(not_found())
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Discovered { name } => name,
            Self::Registered(record) => &record.name,
        }
    }

    pub fn is_discovered(&self) -> bool {
        matches!(self, Self::Discovered { .. })
    }

    /// PM2 id when known
    pub fn pm2_id(&self) -> Option<u32> {
        match self {
            Self::Discovered { .. } => None,
            Self::Registered(record) => record.pm2_id,
        }
    }
}

fn not_found() -> DashboardError {
    DashboardError::NotFound("Application not found".to_string())
}

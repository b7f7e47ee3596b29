//! Bounded per-application error log

use chrono::Utc;
use openapi_server::models::{ErrorCategory, ErrorLogEntry};

use crate::errors::DashboardError;
use crate::storage::layout::StorageLayout;
use crate::utils::generate_uuid;

/// Maximum number of entries kept per application
pub const MAX_ERROR_ENTRIES: usize = 50;

/// An error about to be recorded
#[derive(Debug, Clone)]
pub struct NewErrorEntry {
    pub category: ErrorCategory,
    pub title: String,
    pub message: String,
    pub details: Option<String>,
}

impl NewErrorEntry {
    pub fn new(category: ErrorCategory, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            title: title.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}

/// Error log stored in each application directory, newest first
#[derive(Debug, Clone)]
pub struct ErrorLog {
    layout: StorageLayout,
}

impl ErrorLog {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Prepend an entry, keeping the newest [`MAX_ERROR_ENTRIES`]
    pub async fn append(
        &self,
        app_name: &str,
        entry: NewErrorEntry,
    ) -> Result<ErrorLogEntry, DashboardError> {
        let recorded = ErrorLogEntry {
            id: generate_uuid(),
            timestamp: Utc::now(),
            category: entry.category,
            title: entry.title,
            message: entry.message,
            details: entry.details,
        };

        let stored = recorded.clone();
        self.layout
            .errors_file(app_name)
            .update_json(move |entries: &mut Vec<ErrorLogEntry>| {
                entries.insert(0, stored);
                entries.truncate(MAX_ERROR_ENTRIES);
                Ok(())
            })
            .await?;

        Ok(recorded)
    }

    /// Entries, newest first; empty when missing or unreadable
    pub async fn list(&self, app_name: &str) -> Vec<ErrorLogEntry> {
        self.layout
            .errors_file(app_name)
            .read_json_or_default()
            .await
    }

    /// Drop every entry
    pub async fn clear(&self, app_name: &str) -> Result<(), DashboardError> {
        let file = self.layout.errors_file(app_name);
        let _lock = file.lock().await?;
        file.write_json(&Vec::<ErrorLogEntry>::new()).await
    }
}

//! `.env` files of deployed applications

use openapi_server::models::EnvVar;

use crate::deploy::ecosystem;
use crate::errors::DashboardError;
use crate::storage::layout::StorageLayout;

/// Key assigned by a line; `None` for blank and `#` lines.
///
/// The key is everything before the first `=`, trimmed.
fn line_key(line: &str) -> Option<&str> {
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.split_once('=').map_or(line, |(key, _)| key).trim())
}

/// Parse `.env` contents
pub fn parse(contents: &str) -> Vec<EnvVar> {
    contents
        .lines()
        .filter_map(|line| {
            let key = line_key(line)?;
            let value = line.split_once('=').map_or("", |(_, value)| value);
            Some(EnvVar {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

/// Set `key` in `.env` contents, replacing every existing assignment of it
pub fn upsert(contents: &str, key: &str, value: &str) -> String {
    let assignment = format!("{}={}", key, value);
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;

    for line in contents.lines() {
        if line_key(line) == Some(key) {
            if !replaced {
                lines.push(assignment.clone());
                replaced = true;
            }
        } else {
            lines.push(line.to_string());
        }
    }

    // drop trailing blank lines so appends don't accumulate gaps
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if !replaced {
        lines.push(assignment);
    }
    lines.join("\n")
}

/// Remove every assignment of `key`
pub fn remove(contents: &str, key: &str) -> String {
    contents
        .lines()
        .filter(|line| line_key(line) != Some(key))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reject keys and values that would corrupt the file
pub fn validate(key: &str, value: &str) -> Result<(), DashboardError> {
    if key.is_empty() {
        return Err(DashboardError::Validation("Key and value are required".into()));
    }
    if key.contains('=') || key.chars().any(char::is_whitespace) || key.starts_with('#') {
        return Err(DashboardError::Validation(format!(
            "Invalid environment variable name: {}",
            key
        )));
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(DashboardError::Validation(
            "Environment variable values must be a single line".into(),
        ));
    }
    Ok(())
}

/// Environment variables of each application
#[derive(Debug, Clone)]
pub struct EnvStore {
    layout: StorageLayout,
}

impl EnvStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Variables in file order; empty when there is no `.env`
    pub async fn list(&self, app_name: &str) -> Vec<EnvVar> {
        match self.layout.env_file(app_name).read_string().await {
            Ok(contents) => parse(&contents),
            Err(_) => Vec::new(),
        }
    }

    /// Add or replace a variable and make sure the supervisor config loads `.env`
    pub async fn set(&self, app_name: &str, key: &str, value: &str) -> Result<EnvVar, DashboardError> {
        validate(key, value)?;
        ecosystem::ensure_env_file_reference(&self.layout.app_dir(app_name)).await;

        let file = self.layout.env_file(app_name);
        let _lock = file.lock().await?;
        let contents = file.read_string().await.unwrap_or_default();
        file.write_string(&upsert(&contents, key, value)).await?;

        Ok(EnvVar {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Remove a variable; a missing `.env` is left alone
    pub async fn delete(&self, app_name: &str, key: &str) -> Result<(), DashboardError> {
        let file = self.layout.env_file(app_name);
        if !file.exists().await {
            return Ok(());
        }
        let _lock = file.lock().await?;
        let contents = file.read_string().await?;
        file.write_string(&remove(&contents, key)).await
    }
}

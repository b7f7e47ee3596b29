//! File operations

use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use crate::errors::DashboardError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

/// Exclusive advisory lock on a file, released on drop
#[derive(Debug)]
pub struct FileLock {
    handle: std::fs::File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.handle);
    }
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DashboardError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DashboardError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Read file as JSON, falling back to the default value when the file is
    /// missing or unreadable.
    pub async fn read_json_or_default<T: DeserializeOwned + Default>(&self) -> T {
        match self.read_json().await {
            Ok(value) => value,
            Err(DashboardError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                T::default()
            }
            Err(e) => {
                warn!("Treating {} as empty: {}", self.path.display(), e);
                T::default()
            }
        }
    }

    /// Write string to file
    pub async fn write_string(&self, contents: &str) -> Result<(), DashboardError> {
        self.write_atomic(contents.as_bytes()).await
    }

    /// Write JSON to file
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), DashboardError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_string(&contents).await
    }

    /// Delete the file, ignoring a missing file
    pub async fn delete(&self) -> Result<(), DashboardError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write using a temporary file
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), DashboardError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.sibling("tmp");

        // Write to temp file
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        // Rename to target
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Take an exclusive advisory lock guarding this file.
    ///
    /// The lock lives on a sibling `<name>.lock` file so that the data file
    /// itself can be replaced by rename while the lock is held.
    pub async fn lock(&self) -> Result<FileLock, DashboardError> {
        let lock_path = self.sibling("lock");
        let handle = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let handle = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            handle.lock_exclusive()?;
            Ok(handle)
        })
        .await??;
        Ok(FileLock { handle })
    }

    /// Locked read-modify-write of a JSON document.
    ///
    /// The document is written back only when `f` succeeds.
    pub async fn update_json<T, R, F>(&self, f: F) -> Result<R, DashboardError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Result<R, DashboardError>,
    {
        let _lock = self.lock().await?;
        let mut value: T = self.read_json_or_default().await;
        let result = f(&mut value)?;
        self.write_json(&value).await?;
        Ok(result)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

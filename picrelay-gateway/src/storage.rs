//! Storage for generated images.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

/// Opaque byte storage; returns a locator for the stored artifact.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn persist(&self, bytes: &[u8], suggested_name: &str) -> Result<String, StorageError>;
}

/// Writes artifacts into a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `20250101-120000-<short id>-<sanitized name>`; never collides between jobs.
fn unique_file_name(suggested_name: &str) -> String {
    let sanitized: String = suggested_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('.');
    let sanitized = if sanitized.is_empty() {
        "image.png"
    } else {
        sanitized
    };

    let id = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        &id[..8],
        sanitized
    )
}

#[async_trait::async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, bytes: &[u8], suggested_name: &str) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Io(self.dir.clone(), e))?;

        let path = self.dir.join(unique_file_name(suggested_name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Io(path.clone(), e))?;

        debug!("Stored artifact at {}", path.display());
        Ok(path.to_string_lossy().to_string())
    }
}

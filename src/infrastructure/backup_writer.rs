//! End-of-run JSON backup of every accepted record

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::CanonicalRecord;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to serialize backup: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write backup {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the run's records, in run order, as an indented UTF-8 JSON array.
/// Any file already at the path is replaced.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    path: PathBuf,
}

impl BackupWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records written
    pub async fn write(&self, records: &[CanonicalRecord]) -> Result<usize, BackupError> {
        let json = serde_json::to_string_pretty(records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| self.io_error(source))?;
            }
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| self.io_error(source))?;

        info!(path = %self.path.display(), records = records.len(), "backup written");
        Ok(records.len())
    }

    fn io_error(&self, source: std::io::Error) -> BackupError {
        BackupError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

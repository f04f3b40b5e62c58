//! Portfolio CSV import processing.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Result of a holdings import, also the value replayed for idempotent
/// retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: u64,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumes a spooled CSV upload and produces the import summary.
#[async_trait]
pub trait ImportProcessor: Send + Sync {
    async fn process(&self, csv_path: &Path) -> Result<ImportResult, ImportError>;
}

/// Default processor: counts the non-empty data rows of the upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvImporter;

#[async_trait]
impl ImportProcessor for CsvImporter {
    async fn process(&self, csv_path: &Path) -> Result<ImportResult, ImportError> {
        let contents = tokio::fs::read_to_string(csv_path).await?;
        let imported = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count() as u64;
        Ok(ImportResult { imported })
    }
}

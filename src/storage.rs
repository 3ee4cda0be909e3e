use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ReconError, Result};
use crate::parser::SheetFormat;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub format: SheetFormat,
}

impl StoredFile {
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Checks extension and size before anything is written or recorded.
pub fn validate_upload(path: &Path, size: u64, limit: u64) -> Result<SheetFormat> {
    let format = SheetFormat::from_path(path)?;
    if size > limit {
        return Err(ReconError::FileTooLarge { size, limit });
    }
    Ok(format)
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Copies an upload into `<root>/production-reports/<uploader>/<timestamp>_<name>`.
pub async fn store_upload(root: &Path, uploader: Uuid, source: &Path, limit: u64) -> Result<StoredFile> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| ReconError::storage(e, format!("cannot read {}", source.display())))?;
    let format = validate_upload(source, metadata.len(), limit)?;

    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| ReconError::InvalidInput(format!("{} has no file name", source.display())))?;

    let dir = root.join("production-reports").join(uploader.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ReconError::storage(e, format!("cannot create {}", dir.display())))?;

    let stored_name = format!(
        "{}_{}",
        Utc::now().format("%Y%m%dT%H%M%S%3f"),
        sanitize_file_name(&file_name)
    );
    let path = dir.join(stored_name);
    tokio::fs::copy(source, &path)
        .await
        .map_err(|e| ReconError::storage(e, format!("cannot store {}", path.display())))?;

    Ok(StoredFile {
        file_name,
        path,
        size: metadata.len(),
        format,
    })
}

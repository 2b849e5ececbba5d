use std::path::Path;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::AppError;
use crate::models::file_entry::ScannedFile;

pub fn scanned_file_from_path(path: &Path) -> Option<ScannedFile> {
    let metadata = path.metadata().ok()?;
    if metadata.is_dir() {
        return None;
    }
    let name = path.file_name()?.to_string_lossy().to_string();
    let mime_type = path
        .extension()
        .and_then(|ext| mime_guess::from_ext(&ext.to_string_lossy()).first())
        .map(|m| m.to_string());

    Some(ScannedFile {
        path: path.to_path_buf(),
        name,
        size_bytes: metadata.len(),
        modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        mime_type,
    })
}

/// Walks `root` up to `max_depth` levels and snapshots every regular file.
/// Entries that disappear or cannot be stat'd mid-walk are skipped; a missing
/// root is an error.
pub fn scan(root: &Path, max_depth: usize) -> Result<Vec<ScannedFile>, AppError> {
    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "scan root is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(scanned) = scanned_file_from_path(entry.path()) {
            files.push(scanned);
        }
    }
    tracing::debug!(root = %root.display(), count = files.len(), "scan complete");
    Ok(files)
}

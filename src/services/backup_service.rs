use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackupStrategy {
    /// Skip backups entirely; every call is a no-op.
    None,
    #[default]
    Copy,
}

/// Snapshots the sources of a batch before they are touched. Independent of
/// the undo journal on purpose: if a journal reversal is impossible (the
/// destination got overwritten later), the copies here still exist, keyed
/// only by batch id and filename.
pub struct BackupManager {
    root: PathBuf,
    strategy: BackupStrategy,
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupManifest {
    batch_id: String,
    created_at: DateTime<Utc>,
    /// filename in the backup dir → absolute original path
    files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub file_count: usize,
    pub total_size: u64,
    pub created: DateTime<Utc>,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>, strategy: BackupStrategy) -> Self {
        Self {
            root: root.into(),
            strategy,
        }
    }

    /// Copies every still-existing source into `root/batch_id/` by filename
    /// and records the original locations in a manifest. Sources that vanished
    /// since planning are skipped rather than failing the batch. Returns
    /// `None` when the strategy is `None` or there is nothing to back up.
    pub fn create_backup(
        &self,
        file_paths: &[PathBuf],
        batch_id: &str,
    ) -> Result<Option<PathBuf>, AppError> {
        if self.strategy == BackupStrategy::None || file_paths.is_empty() {
            return Ok(None);
        }

        let dir = self.root.join(batch_id);
        fs::create_dir_all(&dir)?;

        let mut manifest = BackupManifest {
            batch_id: batch_id.to_string(),
            created_at: Utc::now(),
            files: BTreeMap::new(),
        };

        for src in file_paths {
            if !src.is_file() {
                tracing::warn!(path = %src.display(), "source vanished before backup, skipping");
                continue;
            }
            let Some(base) = src.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            // sources from different directories may share a basename; every
            // one of them must survive in the flat batch directory
            let name = unique_backup_name(&base, &manifest.files);
            fs::copy(src, dir.join(&name))?;
            manifest
                .files
                .insert(name, src.to_string_lossy().to_string());
        }

        fs::write(dir.join(MANIFEST_NAME), serde_json::to_string_pretty(&manifest)?)?;
        tracing::info!(batch_id, count = manifest.files.len(), "backup created");
        Ok(Some(dir))
    }

    /// True iff the backup holds exactly one copy per original file. A count
    /// mismatch alone is grounds for failure.
    pub fn verify_backup(
        &self,
        backup_path: &Path,
        original_files: &[PathBuf],
    ) -> Result<bool, AppError> {
        if !backup_path.is_dir() {
            return Ok(false);
        }
        let backed_up = backed_up_names(backup_path)?;
        if backed_up.len() != original_files.len() {
            return Ok(false);
        }
        Ok(original_files.iter().all(|orig| {
            orig.file_name()
                .map(|n| backed_up.contains(&n.to_string_lossy().to_string()))
                .unwrap_or(false)
        }))
    }

    pub fn backup_info(&self, backup_path: &Path) -> Result<BackupInfo, AppError> {
        if !backup_path.is_dir() {
            return Err(AppError::NotFound(format!(
                "no backup at {}",
                backup_path.display()
            )));
        }

        let mut file_count = 0;
        let mut total_size = 0;
        for entry in fs::read_dir(backup_path)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy() == MANIFEST_NAME {
                continue;
            }
            if entry.file_type()?.is_file() {
                file_count += 1;
                total_size += entry.metadata()?.len();
            }
        }

        let created = read_manifest(backup_path)
            .map(|m| m.created_at)
            .or_else(|_| {
                fs::metadata(backup_path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .map_err(AppError::Io)
            })?;

        Ok(BackupInfo {
            path: backup_path.to_path_buf(),
            file_count,
            total_size,
            created,
        })
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, AppError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut infos = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                infos.push(self.backup_info(&entry.path())?);
            }
        }
        infos.sort_by_key(|info| info.created);
        Ok(infos)
    }

    /// Removes backups whose creation time is before the retention window.
    /// A backup inside the window survives any number of calls.
    pub fn cleanup_old_backups(&self, retention_days: i64) -> Result<usize, AppError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut removed = 0;
        for info in self.list_backups()? {
            if info.created < cutoff {
                fs::remove_dir_all(&info.path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, retention_days, "pruned old backups");
        }
        Ok(removed)
    }

    /// Copies every backed-up file back to its manifest-recorded original
    /// location, creating parents as needed. A missing backup directory is
    /// reported as `false`, not an error.
    pub fn restore_backup(&self, backup_path: &Path) -> Result<bool, AppError> {
        if !backup_path.is_dir() {
            return Ok(false);
        }
        let manifest = read_manifest(backup_path)?;
        for (name, original) in &manifest.files {
            let copy = backup_path.join(name);
            if !copy.is_file() {
                return Err(AppError::Integrity(format!(
                    "backup copy missing: {}",
                    copy.display()
                )));
            }
            let original = Path::new(original);
            if let Some(parent) = original.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&copy, original)?;
        }
        tracing::info!(batch_id = %manifest.batch_id, count = manifest.files.len(), "backup restored");
        Ok(true)
    }
}

fn unique_backup_name(base: &str, taken: &BTreeMap<String, String>) -> String {
    if !taken.contains_key(base) {
        return base.to_string();
    }
    let path = Path::new(base);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());
    for n in 2.. {
        let candidate = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if !taken.contains_key(&candidate) {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted")
}

fn backed_up_names(backup_path: &Path) -> Result<Vec<String>, AppError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(backup_path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name != MANIFEST_NAME && entry.file_type()?.is_file() {
            names.push(name);
        }
    }
    Ok(names)
}

fn read_manifest(backup_path: &Path) -> Result<BackupManifest, AppError> {
    let raw = fs::read_to_string(backup_path.join(MANIFEST_NAME)).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::Integrity(format!(
                "backup manifest missing in {}",
                backup_path.display()
            ))
        } else {
            AppError::Io(e)
        }
    })?;
    Ok(serde_json::from_str(&raw)?)
}

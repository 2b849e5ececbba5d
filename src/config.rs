use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::AppError;
use crate::services::backup_service::BackupStrategy;

/// Everything the core needs injected: store locations, safety limits, and
/// the backup policy. Constructed once by the caller and handed to
/// [`crate::services::organize_service::Organizer`]; no process-wide state.
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub cache_db_path: PathBuf,
    pub journal_db_path: PathBuf,
    pub backup_root: PathBuf,
    pub backup_strategy: BackupStrategy,
    /// Roots a plan destination must stay inside. Empty means unrestricted
    /// (protected system paths are still refused).
    pub allowed_roots: Vec<PathBuf>,
    pub max_filename_len: usize,
    pub backup_retention_days: i64,
    pub max_scan_depth: usize,
}

pub const DEFAULT_MAX_FILENAME_LEN: usize = 255;
pub const DEFAULT_BACKUP_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 10;

impl OrganizerConfig {
    /// Platform-conventional store locations under the app's data directory.
    pub fn with_default_paths() -> Result<Self, AppError> {
        let dirs = ProjectDirs::from("com", "tidyvault", "tidyvault")
            .ok_or_else(|| AppError::General("could not resolve data directory".to_string()))?;
        let data = dirs.data_dir().to_path_buf();
        Ok(Self::at(&data))
    }

    /// All stores rooted under one directory. Used by tests and by callers
    /// that manage their own locations.
    pub fn at(base: &std::path::Path) -> Self {
        Self {
            cache_db_path: base.join("cache.db"),
            journal_db_path: base.join("journal.db"),
            backup_root: base.join("backups"),
            backup_strategy: BackupStrategy::Copy,
            allowed_roots: Vec::new(),
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            backup_retention_days: DEFAULT_BACKUP_RETENTION_DAYS,
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_derives_store_paths() {
        let cfg = OrganizerConfig::at(std::path::Path::new("/tmp/tv"));
        assert_eq!(cfg.cache_db_path, PathBuf::from("/tmp/tv/cache.db"));
        assert_eq!(cfg.journal_db_path, PathBuf::from("/tmp/tv/journal.db"));
        assert_eq!(cfg.backup_root, PathBuf::from("/tmp/tv/backups"));
        assert_eq!(cfg.backup_strategy, BackupStrategy::Copy);
        assert!(cfg.allowed_roots.is_empty());
        assert_eq!(cfg.max_filename_len, DEFAULT_MAX_FILENAME_LEN);
    }
}

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::OrganizerConfig;
use crate::error::AppError;
use crate::models::classification::Classification;
use crate::models::file_entry::ScannedFile;
use crate::models::operation::{OperationType, OrganizationPlan, PlannedOperation};
use crate::safety;
use crate::services::backup_service::BackupManager;
use crate::services::hash_service;
use crate::services::scan_service;
use crate::services::undo_service::UndoJournal;

/// Orchestrates a batch end to end: builds a plan from classifier output,
/// validates it against the safety rules, and executes it with the backup
/// manager and undo journal wrapped around every mutation. Owns neither
/// store's data; each component keeps its own file.
pub struct Organizer {
    config: OrganizerConfig,
    backup: BackupManager,
    journal: UndoJournal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub errors: Vec<String>,
    pub operations_performed: usize,
}

impl Organizer {
    pub fn new(config: OrganizerConfig) -> Result<Self, AppError> {
        let backup = BackupManager::new(config.backup_root.clone(), config.backup_strategy);
        let journal = UndoJournal::open(&config.journal_db_path)?;
        Ok(Self {
            config,
            backup,
            journal,
        })
    }

    pub fn journal(&self) -> &UndoJournal {
        &self.journal
    }

    pub fn backup(&self) -> &BackupManager {
        &self.backup
    }

    /// Snapshot the files under `root` with the configured depth limit.
    pub fn scan_source(&self, root: &Path) -> Result<Vec<ScannedFile>, AppError> {
        scan_service::scan(root, self.config.max_scan_depth)
    }

    /// Prune backups past the configured retention window.
    pub fn cleanup_backups(&self) -> Result<usize, AppError> {
        self.backup
            .cleanup_old_backups(self.config.backup_retention_days)
    }

    /// Combines scan output with classifier verdicts into an immutable plan.
    /// Categories are sanitized to a single path component, suggested names
    /// are truncated to the configured limit with the extension kept, and
    /// intra-plan destination collisions get a deterministic `-2`, `-3`, …
    /// suffix in plan order. Files without a verdict are left alone.
    pub fn create_organization_plan(
        &self,
        files: &[ScannedFile],
        analysis: &HashMap<String, Classification>,
        destination_root: &Path,
    ) -> OrganizationPlan {
        let mut used_destinations = HashSet::new();
        let mut operations = Vec::new();

        for file in files {
            let Some(verdict) = analysis.get(file.path.to_string_lossy().as_ref()) else {
                continue;
            };
            let category = safety::sanitize_category(&verdict.category);
            let name = self.destination_name(file, verdict);
            let dest = destination_root.join(&category).join(&name);
            let dest =
                dedupe_destination(dest, &mut used_destinations, self.config.max_filename_len);

            operations.push(PlannedOperation {
                source: file.path.clone(),
                destination: dest,
                operation_type: OperationType::Move,
                confidence: verdict.confidence_clamped(),
            });
        }

        OrganizationPlan::new(uuid::Uuid::new_v4().to_string(), operations)
    }

    fn destination_name(&self, file: &ScannedFile, verdict: &Classification) -> String {
        let mut name = verdict
            .suggested_name
            .clone()
            .map(|n| safety::sanitize_category(&n))
            .filter(|n| n != "uncategorized")
            .unwrap_or_else(|| file.name.clone());

        // a bare suggested name inherits the original extension
        if Path::new(&name).extension().is_none() {
            if let Some(ext) = Path::new(&file.name).extension() {
                name = format!("{name}.{}", ext.to_string_lossy());
            }
        }
        safety::truncate_file_name(&name, self.config.max_filename_len)
    }

    /// Pure safety check; touches nothing. One message per violation, an
    /// empty vec means the plan may execute.
    pub fn validate_plan(&self, plan: &OrganizationPlan) -> Vec<String> {
        let mut errors = Vec::new();
        for op in plan.operations() {
            let dest = safety::normalize_path(&op.destination);
            let dest_str = dest.to_string_lossy();

            if safety::is_protected_path(&dest_str) {
                errors.push(format!(
                    "destination {} is inside a protected system directory",
                    dest_str
                ));
            }

            if !self.config.allowed_roots.is_empty()
                && !self
                    .config
                    .allowed_roots
                    .iter()
                    .any(|root| dest.starts_with(safety::normalize_path(root)))
            {
                errors.push(format!(
                    "destination {} escapes the allowed roots",
                    dest_str
                ));
            }

            if !op.source.exists() {
                errors.push(format!(
                    "source does not exist: {}",
                    op.source.display()
                ));
            } else if op.source.is_file() && fs::File::open(&op.source).is_err() {
                errors.push(format!("source is not readable: {}", op.source.display()));
            }

            if let Some(err) = destination_parent_problem(&dest) {
                errors.push(err);
            }
        }
        errors
    }

    /// Re-validates and then applies the plan in order. Any validation error
    /// or missing source fails the whole batch before a single byte moves.
    /// A dry run stops there and reports what would happen. A live run backs
    /// up every source first, then journals each operation immediately after
    /// it succeeds; a mid-batch failure is recorded and the rest of the batch
    /// continues, so completed operations stay undoable either way.
    pub fn execute_plan(
        &self,
        plan: &OrganizationPlan,
        dry_run: bool,
    ) -> Result<ExecutionResult, AppError> {
        let validation_errors = self.validate_plan(plan);
        if !validation_errors.is_empty() {
            return Ok(ExecutionResult {
                success: false,
                errors: validation_errors,
                operations_performed: 0,
            });
        }

        if dry_run {
            tracing::debug!(
                batch_id = plan.batch_id(),
                operations = plan.operations().len(),
                "dry run, no mutation"
            );
            return Ok(ExecutionResult {
                success: true,
                errors: Vec::new(),
                operations_performed: plan.operations().len(),
            });
        }

        let sources: Vec<PathBuf> = plan
            .operations()
            .iter()
            .map(|op| op.source.clone())
            .collect();
        self.backup.create_backup(&sources, plan.batch_id())?;

        let mut result = ExecutionResult {
            success: true,
            errors: Vec::new(),
            operations_performed: 0,
        };

        for op in plan.operations() {
            let content_hash = hash_service::hash_file(&op.source).ok();
            match apply_operation(op) {
                Ok(()) => {
                    self.journal.record_operation(
                        plan.batch_id(),
                        op.operation_type,
                        &op.source,
                        &op.destination,
                        content_hash.as_deref(),
                    )?;
                    result.operations_performed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        source = %op.source.display(),
                        error = %e,
                        "operation failed, continuing batch"
                    );
                    result.errors.push(format!("{}: {e}", op.source.display()));
                }
            }
        }

        result.success = result.errors.is_empty();
        tracing::info!(
            batch_id = plan.batch_id(),
            performed = result.operations_performed,
            errors = result.errors.len(),
            "batch executed"
        );
        Ok(result)
    }
}

fn apply_operation(op: &PlannedOperation) -> Result<(), AppError> {
    match op.operation_type {
        OperationType::Move | OperationType::Rename => {
            if op.destination.exists() {
                return Err(AppError::General(format!(
                    "destination already exists: {}",
                    op.destination.display()
                )));
            }
            if let Some(parent) = op.destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&op.source, &op.destination)?;
            Ok(())
        }
        OperationType::Copy => {
            if op.destination.exists() {
                return Err(AppError::General(format!(
                    "destination already exists: {}",
                    op.destination.display()
                )));
            }
            if let Some(parent) = op.destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&op.source, &op.destination)?;
            Ok(())
        }
        OperationType::Delete => {
            fs::remove_file(&op.source)?;
            Ok(())
        }
    }
}

fn destination_parent_problem(dest: &Path) -> Option<String> {
    let parent = dest.parent()?;
    let Some(existing) = parent.ancestors().find(|a| a.exists()) else {
        return Some(format!(
            "destination parent has no existing ancestor: {}",
            parent.display()
        ));
    };
    match fs::metadata(existing) {
        Ok(meta) if !meta.is_dir() => Some(format!(
            "destination parent {} crosses a non-directory: {}",
            parent.display(),
            existing.display()
        )),
        Ok(meta) if meta.permissions().readonly() => Some(format!(
            "destination parent is not writable: {}",
            existing.display()
        )),
        Ok(_) => None,
        Err(e) => Some(format!(
            "cannot stat destination ancestor {}: {e}",
            existing.display()
        )),
    }
}

/// Suffixed names shorten the stem so the result still honors `max_len`; a
/// name already at the limit would otherwise grow past it.
fn dedupe_destination(dest: PathBuf, used: &mut HashSet<PathBuf>, max_len: usize) -> PathBuf {
    if used.insert(dest.clone()) {
        return dest;
    }
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = dest.extension().map(|e| e.to_string_lossy().to_string());
    for n in 2.. {
        let suffix = format!("-{n}");
        let candidate_name = match &ext {
            Some(ext) => {
                let reserved = suffix.chars().count() + ext.chars().count() + 1;
                let budget = max_len.saturating_sub(reserved).max(1);
                let stem_part: String = stem.chars().take(budget).collect();
                format!("{stem_part}{suffix}.{ext}")
            }
            None => {
                let budget = max_len.saturating_sub(suffix.chars().count()).max(1);
                let stem_part: String = stem.chars().take(budget).collect();
                format!("{stem_part}{suffix}")
            }
        };
        let candidate = dest.with_file_name(candidate_name);
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted")
}

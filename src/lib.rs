//! Transactional core for LLM-assisted file organization.
//!
//! A classifier (local or cloud model) proposes a category and name per
//! file; this crate turns those verdicts into something safe to act on:
//!
//! - [`services::hash_service`] fingerprints file content (cache key and
//!   integrity check)
//! - [`services::cache_service::ResultCache`] persists classifier verdicts
//!   keyed by (content hash, model) so the expensive call never repeats
//! - [`services::backup_service::BackupManager`] snapshots sources per batch
//!   before anything moves
//! - [`services::undo_service::UndoJournal`] durably records every executed
//!   operation and can reverse a batch idempotently
//! - [`services::organize_service::Organizer`] builds, validates, and
//!   executes plans (dry-run or live) with backup and journal wrapped
//!   around each mutation
//!
//! All operations are synchronous and meant for one caller at a time; the
//! stores are independent SQLite files plus a plain backup directory tree.

pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod safety;
pub mod services;

pub use config::OrganizerConfig;
pub use error::AppError;
pub use models::classification::Classification;
pub use models::file_entry::ScannedFile;
pub use models::operation::{OperationRecord, OperationType, OrganizationPlan, PlannedOperation};
pub use services::backup_service::{BackupInfo, BackupManager, BackupStrategy};
pub use services::cache_service::{CacheStats, ResultCache};
pub use services::organize_service::{ExecutionResult, Organizer};
pub use services::undo_service::{UndoJournal, UndoResult};

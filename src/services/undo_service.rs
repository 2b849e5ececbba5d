use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::data::migrations;
use crate::error::AppError;
use crate::models::operation::{OperationRecord, OperationType};

/// Durable log of every executed operation, grouped by batch. The journal is
/// the authoritative record of what actually happened on disk; a record is
/// appended right after its operation succeeds and flipped to `undone`
/// exactly once when reversed.
pub struct UndoJournal {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
pub struct UndoResult {
    pub success: bool,
    pub operations_undone: usize,
    pub errors: Vec<String>,
}

impl UndoResult {
    fn empty() -> Self {
        Self {
            success: true,
            operations_undone: 0,
            errors: Vec::new(),
        }
    }
}

impl UndoJournal {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::run_journal_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_journal_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Append-only; prior records are never rewritten.
    pub fn record_operation(
        &self,
        batch_id: &str,
        operation_type: OperationType,
        source_path: &Path,
        target_path: &Path,
        content_hash: Option<&str>,
    ) -> Result<(), AppError> {
        self.conn.execute(
            "INSERT INTO operations (batch_id, operation_type, source_path, target_path, content_hash, timestamp, undone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                batch_id,
                operation_type.to_string(),
                source_path.to_string_lossy(),
                target_path.to_string_lossy(),
                content_hash,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Reverses every not-yet-undone record of the batch, newest first so
    /// chained moves through the same path unwind correctly. One failed
    /// record does not stop the rest; `success` means zero errors. A batch
    /// that is already fully undone yields a vacuous success.
    pub fn undo_batch(&self, batch_id: &str) -> Result<UndoResult, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, operation_type, source_path, target_path
             FROM operations WHERE batch_id = ?1 AND undone = 0
             ORDER BY id DESC",
        )?;
        let pending: Vec<(i64, OperationType, String, String)> = stmt
            .query_map(params![batch_id], |row| {
                let op_type: String = row.get(1)?;
                Ok((
                    row.get(0)?,
                    op_type.parse().unwrap_or(OperationType::Move),
                    row.get(2)?,
                    row.get(3)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let mut result = UndoResult::empty();
        for (id, op_type, source, target) in pending {
            match self.reverse_one(op_type, &source, &target) {
                Ok(()) => {
                    self.mark_undone(id)?;
                    result.operations_undone += 1;
                }
                Err(e) => result.errors.push(format!("{op_type} {target}: {e}")),
            }
        }
        result.success = result.errors.is_empty();
        tracing::info!(
            batch_id,
            undone = result.operations_undone,
            errors = result.errors.len(),
            "undo batch finished"
        );
        Ok(result)
    }

    /// Undoes the most recently recorded batch that still has live records.
    /// An empty journal is not an error: there is simply nothing to do.
    pub fn undo_last(&self) -> Result<UndoResult, AppError> {
        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT batch_id FROM operations WHERE undone = 0 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match latest {
            Some(batch_id) => self.undo_batch(&batch_id),
            None => Ok(UndoResult::empty()),
        }
    }

    /// True iff every live record's target still exists on disk.
    pub fn verify_undo_possible(&self, batch_id: &str) -> Result<bool, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT target_path FROM operations WHERE batch_id = ?1 AND undone = 0",
        )?;
        let targets: Vec<String> = stmt
            .query_map(params![batch_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(targets.iter().all(|t| Path::new(t).exists()))
    }

    /// Most recent first, optionally capped.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<OperationRecord>, AppError> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, operation_type, source_path, target_path, content_hash, timestamp, undone
             FROM operations ORDER BY id DESC LIMIT ?1",
        )?;
        let cap = limit.map(|l| l as i64).unwrap_or(-1);
        let records = stmt
            .query_map(params![cap], |row| {
                let op_type: String = row.get(1)?;
                Ok(OperationRecord {
                    batch_id: row.get(0)?,
                    operation_type: op_type.parse().unwrap_or(OperationType::Move),
                    source_path: row.get(2)?,
                    target_path: row.get(3)?,
                    content_hash: row.get(4)?,
                    timestamp: row.get(5)?,
                    undone: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    /// Permanently deletes records older than the cutoff, undone or not.
    pub fn clear_history(&self, older_than: DateTime<Utc>) -> Result<usize, AppError> {
        let count = self.conn.execute(
            "DELETE FROM operations WHERE timestamp < ?1",
            params![older_than.to_rfc3339()],
        )?;
        tracing::info!(count, "journal history cleared");
        Ok(count)
    }

    fn reverse_one(
        &self,
        op_type: OperationType,
        source: &str,
        target: &str,
    ) -> Result<(), AppError> {
        let source_path = Path::new(source);
        let target_path = Path::new(target);
        match op_type {
            OperationType::Move | OperationType::Rename => {
                if !target_path.exists() {
                    return Err(AppError::NotFound(format!("target no longer exists: {target}")));
                }
                // something may have been re-created at the original path
                // since the batch ran; never destroy it
                if source_path.exists() {
                    return Err(AppError::General(format!(
                        "original path is occupied: {source}"
                    )));
                }
                if let Some(parent) = source_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(target_path, source_path)?;
                Ok(())
            }
            OperationType::Copy => {
                if !target_path.exists() {
                    return Err(AppError::NotFound(format!("copy no longer exists: {target}")));
                }
                if target_path.is_dir() {
                    fs::remove_dir_all(target_path)?;
                } else {
                    fs::remove_file(target_path)?;
                }
                Ok(())
            }
            OperationType::Delete => Err(AppError::General(
                "delete cannot be reversed from the journal; restore the batch backup".to_string(),
            )),
        }
    }

    fn mark_undone(&self, id: i64) -> Result<(), AppError> {
        self.conn
            .execute("UPDATE operations SET undone = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_tree() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        let dst_dir = dir.path().join("dst");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&dst_dir).unwrap();
        (dir, src_dir, dst_dir)
    }

    fn do_move(journal: &UndoJournal, batch: &str, src: &Path, dst: &Path) {
        fs::rename(src, dst).unwrap();
        journal
            .record_operation(batch, OperationType::Move, src, dst, None)
            .unwrap();
    }

    #[test]
    fn test_undo_batch_restores_and_is_idempotent() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src = src_dir.join("a.txt");
        let dst = dst_dir.join("a.txt");
        File::create(&src).unwrap().write_all(b"test").unwrap();

        do_move(&journal, "batch-1", &src, &dst);
        assert!(!src.exists());
        assert!(dst.exists());

        let result = journal.undo_batch("batch-1").unwrap();
        assert!(result.success);
        assert_eq!(result.operations_undone, 1);
        assert!(src.exists());
        assert!(!dst.exists());

        let record = &journal.history(None).unwrap()[0];
        assert!(record.undone);

        // second undo finds nothing eligible
        let again = journal.undo_batch("batch-1").unwrap();
        assert!(again.success);
        assert_eq!(again.operations_undone, 0);
    }

    #[test]
    fn test_undo_recreates_missing_source_parent() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let nested = src_dir.join("deep").join("nest");
        fs::create_dir_all(&nested).unwrap();
        let src = nested.join("f.txt");
        let dst = dst_dir.join("f.txt");
        File::create(&src).unwrap().write_all(b"x").unwrap();

        do_move(&journal, "b", &src, &dst);
        fs::remove_dir_all(src_dir.join("deep")).unwrap();

        let result = journal.undo_batch("b").unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert!(src.exists());
    }

    #[test]
    fn test_missing_target_errors_but_continues() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src_a = src_dir.join("a.txt");
        let dst_a = dst_dir.join("a.txt");
        let src_b = src_dir.join("b.txt");
        let dst_b = dst_dir.join("b.txt");
        File::create(&src_a).unwrap().write_all(b"a").unwrap();
        File::create(&src_b).unwrap().write_all(b"b").unwrap();

        do_move(&journal, "b", &src_a, &dst_a);
        do_move(&journal, "b", &src_b, &dst_b);
        fs::remove_file(&dst_a).unwrap();

        let result = journal.undo_batch("b").unwrap();
        assert!(!result.success);
        assert_eq!(result.operations_undone, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(src_b.exists());

        // the failed record stays live for a later attempt
        assert!(!journal.verify_undo_possible("b").unwrap());
    }

    #[test]
    fn test_undo_refuses_to_clobber_recreated_source() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src = src_dir.join("doc.txt");
        let dst = dst_dir.join("doc.txt");
        File::create(&src).unwrap().write_all(b"original").unwrap();

        do_move(&journal, "b", &src, &dst);
        // the user put something new where the file used to live
        fs::write(&src, b"new precious data").unwrap();

        let result = journal.undo_batch("b").unwrap();
        assert!(!result.success);
        assert_eq!(result.operations_undone, 0);
        assert!(result.errors[0].contains("occupied"));
        assert_eq!(fs::read(&src).unwrap(), b"new precious data");
        assert_eq!(fs::read(&dst).unwrap(), b"original");

        // clearing the occupant lets the still-live record undo cleanly
        fs::remove_file(&src).unwrap();
        let retry = journal.undo_batch("b").unwrap();
        assert!(retry.success);
        assert_eq!(retry.operations_undone, 1);
        assert_eq!(fs::read(&src).unwrap(), b"original");
    }

    #[test]
    fn test_undo_copy_removes_duplicate() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src = src_dir.join("orig.txt");
        let dst = dst_dir.join("orig.txt");
        File::create(&src).unwrap().write_all(b"x").unwrap();
        fs::copy(&src, &dst).unwrap();
        journal
            .record_operation("b", OperationType::Copy, &src, &dst, None)
            .unwrap();

        let result = journal.undo_batch("b").unwrap();
        assert!(result.success);
        assert!(src.exists());
        assert!(!dst.exists());
    }

    #[test]
    fn test_undo_delete_reports_error() {
        let journal = UndoJournal::open_in_memory().unwrap();
        journal
            .record_operation(
                "b",
                OperationType::Delete,
                Path::new("/tmp/x"),
                Path::new("/tmp/x"),
                None,
            )
            .unwrap();

        let result = journal.undo_batch("b").unwrap();
        assert!(!result.success);
        assert_eq!(result.operations_undone, 0);
        assert!(result.errors[0].contains("backup"));
    }

    #[test]
    fn test_undo_last_empty_journal_is_vacuous_success() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let result = journal.undo_last().unwrap();
        assert!(result.success);
        assert_eq!(result.operations_undone, 0);
    }

    #[test]
    fn test_undo_last_picks_most_recent_batch() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src_a = src_dir.join("first.txt");
        let dst_a = dst_dir.join("first.txt");
        let src_b = src_dir.join("second.txt");
        let dst_b = dst_dir.join("second.txt");
        File::create(&src_a).unwrap().write_all(b"1").unwrap();
        File::create(&src_b).unwrap().write_all(b"2").unwrap();

        do_move(&journal, "older", &src_a, &dst_a);
        do_move(&journal, "newer", &src_b, &dst_b);

        let result = journal.undo_last().unwrap();
        assert_eq!(result.operations_undone, 1);
        assert!(src_b.exists());
        assert!(dst_a.exists(), "older batch untouched");
    }

    #[test]
    fn test_verify_undo_possible() {
        let journal = UndoJournal::open_in_memory().unwrap();
        let (_dir, src_dir, dst_dir) = temp_tree();
        let src = src_dir.join("v.txt");
        let dst = dst_dir.join("v.txt");
        File::create(&src).unwrap().write_all(b"x").unwrap();

        do_move(&journal, "b", &src, &dst);
        assert!(journal.verify_undo_possible("b").unwrap());

        fs::remove_file(&dst).unwrap();
        assert!(!journal.verify_undo_possible("b").unwrap());
    }

    #[test]
    fn test_history_order_and_limit() {
        let journal = UndoJournal::open_in_memory().unwrap();
        for i in 0..3 {
            journal
                .record_operation(
                    &format!("b{i}"),
                    OperationType::Move,
                    Path::new("/tmp/s"),
                    Path::new("/tmp/t"),
                    None,
                )
                .unwrap();
        }

        let all = journal.history(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].batch_id, "b2");

        let capped = journal.history(Some(2)).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].batch_id, "b2");
    }

    #[test]
    fn test_clear_history_by_age() {
        let journal = UndoJournal::open_in_memory().unwrap();
        journal
            .record_operation(
                "b",
                OperationType::Move,
                Path::new("/tmp/s"),
                Path::new("/tmp/t"),
                None,
            )
            .unwrap();

        assert_eq!(
            journal
                .clear_history(Utc::now() - chrono::Duration::days(1))
                .unwrap(),
            0
        );
        assert_eq!(
            journal
                .clear_history(Utc::now() + chrono::Duration::seconds(1))
                .unwrap(),
            1
        );
        assert!(journal.history(None).unwrap().is_empty());
    }

    #[test]
    fn test_records_content_hash() {
        let journal = UndoJournal::open_in_memory().unwrap();
        journal
            .record_operation(
                "b",
                OperationType::Move,
                Path::new("/tmp/s"),
                Path::new("/tmp/t"),
                Some("ab".repeat(32).as_str()),
            )
            .unwrap();

        let record = &journal.history(None).unwrap()[0];
        assert_eq!(record.content_hash.as_deref(), Some("ab".repeat(32).as_str()));
    }
}

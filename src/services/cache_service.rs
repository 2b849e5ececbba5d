use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::data::migrations;
use crate::error::AppError;
use crate::models::classification::Classification;

/// Persistent map of (content fingerprint, model name) → classification.
/// Keyed on content so a renamed or duplicated file reuses its verdict, and
/// on model so different classifiers never share entries.
pub struct ResultCache {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub unique_files: u64,
    pub total_accesses: u64,
}

impl ResultCache {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::run_cache_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_cache_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Looks up one entry. A hit bumps its access counter and returns an
    /// owned copy of the stored result; a miss changes nothing.
    pub fn get(
        &self,
        fingerprint: &str,
        model: &str,
    ) -> Result<Option<Classification>, AppError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "UPDATE classification_cache SET access_count = access_count + 1
                 WHERE file_hash = ?1 AND model_name = ?2
                 RETURNING result",
                params![fingerprint, model],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Upsert: an existing key gets a fresh result and `created_at` but keeps
    /// its access counter; a new key starts at zero accesses.
    pub fn set(
        &self,
        fingerprint: &str,
        model: &str,
        result: &Classification,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(result)?;
        self.conn.execute(
            "INSERT INTO classification_cache (file_hash, model_name, result, created_at, access_count)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT (file_hash, model_name)
             DO UPDATE SET result = excluded.result, created_at = excluded.created_at",
            params![fingerprint, model, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<usize, AppError> {
        let count = self.conn.execute("DELETE FROM classification_cache", [])?;
        tracing::info!(count, "cache cleared");
        Ok(count)
    }

    /// Deletes entries strictly older than `days` days. Timestamps are
    /// RFC 3339 in UTC, so string comparison orders them correctly.
    pub fn clear_old(&self, days: i64) -> Result<usize, AppError> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let count = self.conn.execute(
            "DELETE FROM classification_cache WHERE created_at < ?1",
            params![cutoff],
        )?;
        tracing::info!(count, days, "evicted aged cache entries");
        Ok(count)
    }

    pub fn stats(&self) -> Result<CacheStats, AppError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT file_hash), COALESCE(SUM(access_count), 0)
             FROM classification_cache",
            [],
            |row| {
                Ok(CacheStats {
                    total_entries: row.get::<_, i64>(0)? as u64,
                    unique_files: row.get::<_, i64>(1)? as u64,
                    total_accesses: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

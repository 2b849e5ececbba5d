use rusqlite::Connection;

use crate::error::AppError;

const CACHE_SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS classification_cache (
    file_hash TEXT NOT NULL,
    model_name TEXT NOT NULL,
    result TEXT NOT NULL,
    created_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (file_hash, model_name)
);

CREATE INDEX IF NOT EXISTS idx_cache_created ON classification_cache(created_at);
";

const JOURNAL_SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    source_path TEXT NOT NULL,
    target_path TEXT NOT NULL,
    content_hash TEXT,
    timestamp TEXT NOT NULL,
    undone BOOLEAN NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_operations_batch ON operations(batch_id);
CREATE INDEX IF NOT EXISTS idx_operations_time ON operations(timestamp DESC);
";

pub fn run_cache_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(CACHE_SCHEMA_V1)?;
    Ok(())
}

pub fn run_journal_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(JOURNAL_SCHEMA_V1)?;
    Ok(())
}

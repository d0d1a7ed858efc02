//! Database schema definitions and migrations.

use rusqlite::{Connection, TransactionBehavior};

use super::error::StateError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
///
/// Column names for `runs` and `files` match catalogs written by the
/// earlier Python ingest script, so existing stores open without a rewrite.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT NOT NULL,
    source TEXT NOT NULL,
    remote TEXT NOT NULL,
    started_at TEXT NOT NULL,
    raw_file TEXT NOT NULL,
    rclone_command TEXT NOT NULL,
    completed_at TEXT,
    PRIMARY KEY (run_id, source)
);

CREATE TABLE IF NOT EXISTS chunks (
    run_id TEXT NOT NULL,
    source TEXT NOT NULL,
    chunk_name TEXT NOT NULL,
    remote TEXT NOT NULL,
    rclone_command TEXT NOT NULL,
    raw_file TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT,
    listed_at TEXT,
    completed_at TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (run_id, source, chunk_name)
);

CREATE INDEX IF NOT EXISTS idx_chunks_status ON chunks(status);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    source TEXT NOT NULL,
    remote TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER NOT NULL,
    modtime TEXT NOT NULL,
    ext TEXT NOT NULL,
    is_media INTEGER NOT NULL,
    media_kind TEXT NOT NULL,
    ignored_reason TEXT NOT NULL,
    UNIQUE(run_id, source, path)
);

CREATE INDEX IF NOT EXISTS idx_files_source_media ON files(source, is_media);
CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);
CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);
CREATE INDEX IF NOT EXISTS idx_files_run ON files(run_id);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StateError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// This function is idempotent and safe to call on both new and existing databases.
/// The version check and DDL share one IMMEDIATE transaction, so two processes
/// opening a fresh store at the same moment cannot interleave their migrations.
pub(crate) fn migrate(conn: &mut Connection) -> Result<(), StateError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current_version = get_schema_version(&tx)?;

    if current_version > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        // IF NOT EXISTS keeps this safe on stores created without a version stamp
        tx.execute_batch(SCHEMA_V1)?;
        set_schema_version(&tx, SCHEMA_VERSION)?;
        tracing::debug!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrated catalog schema"
        );
    }

    tx.commit()?;
    Ok(())
}

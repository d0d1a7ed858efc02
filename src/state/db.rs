//! Catalog store trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, TransactionBehavior};

use super::clock::{format_timestamp, Clock, SystemClock};
use super::error::StateError;
use super::schema;
use super::types::{ChunkStamp, ChunkUpdate, FileEntry, RunRecord};

/// Write-side operations on the catalog.
///
/// This trait is object-safe and can be used as `&dyn CatalogDb` by the
/// ingest pipeline. Every method is one scoped transaction: it either
/// commits in full or leaves the store untouched.
#[async_trait]
pub trait CatalogDb: Send + Sync {
    /// Create or overwrite the run row with a fresh `started_at`.
    ///
    /// Any previous `completed_at` for the same `(run_id, source)` is cleared,
    /// so a re-run reads as incomplete until it finishes.
    async fn begin_run(&self, run: &RunRecord) -> Result<(), StateError>;

    /// Stamp the run's `completed_at`.
    async fn complete_run(&self, run_id: &str, source: &str) -> Result<(), StateError>;

    /// Move a chunk to a new status, creating the row on first use.
    ///
    /// The timestamp belonging to the new status is written only if it is
    /// still unset. Remote, command, raw file, status and `updated_at` are
    /// always overwritten.
    async fn advance_chunk(&self, update: &ChunkUpdate) -> Result<(), StateError>;

    /// Insert or replace a batch of file rows for a run.
    ///
    /// Rows are keyed on `(run_id, source, path)`; an existing row for the
    /// same key is overwritten with the new values. Returns the number of
    /// rows written.
    async fn upsert_files(&self, run: &RunRecord, files: &[FileEntry])
        -> Result<usize, StateError>;
}

/// SQLite implementation of the catalog store.
pub struct SqliteCatalogDb {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteCatalogDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalogDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Open a connection configured for several concurrent writer processes.
fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, StateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StateError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let open_err = |e: rusqlite::Error| StateError::Open {
        path: path.to_path_buf(),
        source: e,
    };
    let mut conn = Connection::open(path).map_err(open_err)?;

    // Wait for competing writers instead of failing with SQLITE_BUSY.
    // Must be set before the first statement that takes a lock.
    conn.busy_timeout(busy_timeout).map_err(open_err)?;

    // WAL lets readers see committed data while another process writes
    conn.pragma_update(None, "journal_mode", "WAL").map_err(open_err)?;
    conn.pragma_update(None, "synchronous", "NORMAL").map_err(open_err)?;

    schema::migrate(&mut conn)?;
    Ok(conn)
}

impl SqliteCatalogDb {
    /// Open or create a database at the given path.
    ///
    /// Missing parent directories are created first.
    pub async fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn =
            tokio::task::spawn_blocking(move || open_connection(&path_clone, busy_timeout))
                .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            clock: Arc::new(SystemClock),
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let mut conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used for store-written timestamps.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }
}

#[async_trait]
impl CatalogDb for SqliteCatalogDb {
    async fn begin_run(&self, run: &RunRecord) -> Result<(), StateError> {
        let started_at = self.now();
        let mut conn = self.lock()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StateError::query)?;
        tx.execute(
            r#"
            INSERT INTO runs (run_id, source, remote, started_at, raw_file, rclone_command, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
            ON CONFLICT(run_id, source) DO UPDATE SET
                remote = excluded.remote,
                started_at = excluded.started_at,
                raw_file = excluded.raw_file,
                rclone_command = excluded.rclone_command,
                completed_at = NULL
            "#,
            rusqlite::params![
                run.run_id,
                run.source,
                run.remote,
                started_at,
                run.raw_file.to_string_lossy(),
                run.listing_command,
            ],
        )
        .map_err(StateError::query)?;
        tx.commit().map_err(StateError::query)?;

        Ok(())
    }

    async fn complete_run(&self, run_id: &str, source: &str) -> Result<(), StateError> {
        let completed_at = self.now();
        let mut conn = self.lock()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StateError::query)?;
        let rows = tx
            .execute(
                "UPDATE runs SET completed_at = ?1 WHERE run_id = ?2 AND source = ?3",
                rusqlite::params![completed_at, run_id, source],
            )
            .map_err(StateError::query)?;
        if rows == 0 {
            return Err(StateError::Validation(format!(
                "no run recorded for run_id={run_id} source={source}"
            )));
        }
        tx.commit().map_err(StateError::query)?;

        Ok(())
    }

    async fn advance_chunk(&self, update: &ChunkUpdate) -> Result<(), StateError> {
        if update.chunk_name.trim().is_empty() {
            return Err(StateError::Validation(
                "chunk name is required for a chunk status update".to_string(),
            ));
        }

        let now = self.now();
        let stamp = update.status.stamps();
        let stamp_if = |wanted: ChunkStamp| (stamp == wanted).then(|| now.clone());

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StateError::query)?;

        // Single statement: set-once columns keep the first non-null value, so
        // two writers racing on the same chunk cannot clobber each other's stamps.
        tx.execute(
            r#"
            INSERT INTO chunks (run_id, source, chunk_name, remote, rclone_command, raw_file,
                                status, started_at, listed_at, completed_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(run_id, source, chunk_name) DO UPDATE SET
                remote = excluded.remote,
                rclone_command = excluded.rclone_command,
                raw_file = excluded.raw_file,
                status = excluded.status,
                started_at = COALESCE(chunks.started_at, excluded.started_at),
                listed_at = COALESCE(chunks.listed_at, excluded.listed_at),
                completed_at = COALESCE(chunks.completed_at, excluded.completed_at),
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![
                update.run.run_id,
                update.run.source,
                update.chunk_name,
                update.run.remote,
                update.run.listing_command,
                update.run.raw_file.to_string_lossy(),
                update.status.as_str(),
                stamp_if(ChunkStamp::StartedAt),
                stamp_if(ChunkStamp::ListedAt),
                stamp_if(ChunkStamp::CompletedAt),
                now,
            ],
        )
        .map_err(StateError::query)?;
        tx.commit().map_err(StateError::query)?;

        tracing::debug!(
            run_id = %update.run.run_id,
            source = %update.run.source,
            chunk = %update.chunk_name,
            status = update.status.as_str(),
            "Chunk status updated"
        );
        Ok(())
    }

    async fn upsert_files(
        &self,
        run: &RunRecord,
        files: &[FileEntry],
    ) -> Result<usize, StateError> {
        if files.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StateError::query)?;

        {
            let mut stmt = tx
                .prepare_cached(
                    r#"
                    INSERT INTO files (run_id, source, remote, path, size, modtime, ext, is_media, media_kind, ignored_reason)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(run_id, source, path) DO UPDATE SET
                        remote = excluded.remote,
                        size = excluded.size,
                        modtime = excluded.modtime,
                        ext = excluded.ext,
                        is_media = excluded.is_media,
                        media_kind = excluded.media_kind,
                        ignored_reason = excluded.ignored_reason
                    "#,
                )
                .map_err(StateError::query)?;

            for file in files {
                let c = &file.classification;
                stmt.execute(rusqlite::params![
                    run.run_id,
                    run.source,
                    run.remote,
                    file.path,
                    file.size as i64,
                    file.modtime,
                    c.ext,
                    c.is_media(),
                    c.media_kind.as_str(),
                    c.ignored_reason_str(),
                ])
                .map_err(StateError::query)?;
            }
        }

        tx.commit().map_err(StateError::query)?;
        Ok(files.len())
    }
}

#[cfg(test)]
impl SqliteCatalogDb {
    pub fn get_run(&self, run_id: &str, source: &str) -> Option<super::types::RunRow> {
        use rusqlite::OptionalExtension;

        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT remote, started_at, raw_file, rclone_command, completed_at FROM runs WHERE run_id = ?1 AND source = ?2",
            [run_id, source],
            |row| {
                Ok(super::types::RunRow {
                    remote: row.get(0)?,
                    started_at: row.get(1)?,
                    raw_file: row.get(2)?,
                    rclone_command: row.get(3)?,
                    completed_at: row.get(4)?,
                })
            },
        )
        .optional()
        .unwrap()
    }

    pub fn get_chunk(
        &self,
        run_id: &str,
        source: &str,
        chunk_name: &str,
    ) -> Option<super::types::ChunkRow> {
        use super::types::ChunkStatus;
        use rusqlite::OptionalExtension;

        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT remote, rclone_command, raw_file, status, started_at, listed_at, completed_at, updated_at FROM chunks WHERE run_id = ?1 AND source = ?2 AND chunk_name = ?3",
            [run_id, source, chunk_name],
            |row| {
                let status: String = row.get(3)?;
                Ok(super::types::ChunkRow {
                    remote: row.get(0)?,
                    rclone_command: row.get(1)?,
                    raw_file: row.get(2)?,
                    status: ChunkStatus::from_str(&status).expect("known chunk status"),
                    started_at: row.get(4)?,
                    listed_at: row.get(5)?,
                    completed_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()
        .unwrap()
    }

    pub fn get_file(&self, run_id: &str, source: &str, path: &str) -> Option<super::types::FileRow> {
        use rusqlite::OptionalExtension;

        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT id, remote, size, modtime, ext, is_media, media_kind, ignored_reason FROM files WHERE run_id = ?1 AND source = ?2 AND path = ?3",
            [run_id, source, path],
            |row| {
                Ok(super::types::FileRow {
                    id: row.get(0)?,
                    remote: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    modtime: row.get(3)?,
                    ext: row.get(4)?,
                    is_media: row.get(5)?,
                    media_kind: row.get(6)?,
                    ignored_reason: row.get(7)?,
                })
            },
        )
        .optional()
        .unwrap()
    }

    pub fn count_files(&self, run_id: &str, source: &str) -> u64 {
        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM files WHERE run_id = ?1 AND source = ?2",
            [run_id, source],
            |row| row.get::<_, i64>(0),
        )
        .unwrap() as u64
    }
}

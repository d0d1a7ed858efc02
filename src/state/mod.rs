//! Catalog store.
//!
//! SQLite-backed storage for listing runs, per-chunk progress and the
//! deduplicated file catalog. Several processes may write to the same store
//! at once; every write is a single IMMEDIATE transaction under WAL.

pub mod clock;
pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{CatalogDb, SqliteCatalogDb};
pub use error::StateError;
pub use types::{ChunkStatus, ChunkUpdate, FileEntry, RunRecord};

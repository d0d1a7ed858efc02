//! Ingest pipeline: stream a listing file into the catalog in batches.
//!
//! Lines are parsed and classified one at a time and buffered; every
//! `batch_size` records are committed as one transaction, so a crash loses at
//! most the batch in flight. Malformed lines go to the quarantine log and the
//! run carries on. The run's `completed_at` is written only after the last
//! batch commits, so an interrupted ingest is visible as an incomplete run.

pub mod error;
pub mod quarantine;

use std::path::PathBuf;

use tokio::io::BufReader;

use crate::classify::ClassificationRules;
use crate::listing::{ListingLine, ListingReader};
use crate::state::{CatalogDb, FileEntry, RunRecord};

pub use error::IngestError;
pub use quarantine::QuarantineLog;

/// Records per committed batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Knobs for a single ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Where malformed lines are appended.
    pub quarantine_path: PathBuf,
}

/// Counters reported at the end of an ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Every line read, blank lines included.
    pub lines_seen: u64,
    /// File rows written (inserted or replaced).
    pub records_inserted: u64,
    /// Lines sent to the quarantine log.
    pub parse_errors: u64,
}

/// Ingest `run.raw_file` into the catalog.
///
/// The listing file and the quarantine log are opened before the run row is
/// touched, so an unreadable input leaves the store unchanged.
pub async fn ingest(
    db: &dyn CatalogDb,
    rules: &ClassificationRules,
    run: &RunRecord,
    options: &IngestOptions,
) -> Result<IngestStats, IngestError> {
    if options.batch_size == 0 {
        return Err(IngestError::Options(
            "batch size must be at least 1".to_string(),
        ));
    }

    let file = tokio::fs::File::open(&run.raw_file)
        .await
        .map_err(|source| IngestError::OpenRawFile {
            path: run.raw_file.clone(),
            source,
        })?;
    let mut reader = ListingReader::new(BufReader::with_capacity(READ_BUFFER_BYTES, file));
    let mut quarantine = QuarantineLog::open(&options.quarantine_path).await?;

    db.begin_run(run).await?;
    tracing::info!(
        run_id = %run.run_id,
        source = %run.source,
        raw_file = %run.raw_file.display(),
        "Starting ingest"
    );

    let mut stats = IngestStats::default();
    let mut batch: Vec<FileEntry> = Vec::with_capacity(options.batch_size);

    while let Some(line) = reader.next_line().await.map_err(IngestError::Read)? {
        match line {
            ListingLine::Blank => {}
            ListingLine::Malformed(err) => {
                tracing::debug!(error = %err, "Quarantined listing line");
                quarantine.record(&err).await?;
                stats.parse_errors += 1;
            }
            ListingLine::Record(record) => {
                let classification = rules.classify(&record.path);
                batch.push(FileEntry::new(record, classification));
                if batch.len() >= options.batch_size {
                    stats.records_inserted += flush(db, run, &mut batch).await?;
                }
            }
        }
    }
    stats.records_inserted += flush(db, run, &mut batch).await?;
    stats.lines_seen = reader.lines_seen();

    if quarantine.written() > 0 {
        tracing::warn!(
            count = quarantine.written(),
            log = %quarantine.path().display(),
            "Some listing lines could not be parsed"
        );
    }
    quarantine.finish().await?;

    db.complete_run(&run.run_id, &run.source).await?;
    tracing::info!(
        run_id = %run.run_id,
        source = %run.source,
        lines = stats.lines_seen,
        records = stats.records_inserted,
        parse_errors = stats.parse_errors,
        "Ingest complete"
    );

    Ok(stats)
}

/// Commit the buffered records and clear the buffer.
async fn flush(
    db: &dyn CatalogDb,
    run: &RunRecord,
    batch: &mut Vec<FileEntry>,
) -> Result<u64, IngestError> {
    if batch.is_empty() {
        return Ok(0);
    }
    let written = db.upsert_files(run, batch).await?;
    tracing::debug!(records = written, "Committed batch");
    batch.clear();
    Ok(written as u64)
}

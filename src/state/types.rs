//! Types for the catalog store.

use std::path::PathBuf;

use crate::classify::Classification;
use crate::listing::ListingRecord;

/// Identity and provenance of one listing run for a source.
///
/// The store keys runs on `(run_id, source)`; chunk and file rows carry the
/// same pair and are correlated through it.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub source: String,
    /// Storage backend the listing was taken from (e.g. `gdrive:`).
    pub remote: String,
    /// Listing file produced by the external listing tool.
    pub raw_file: PathBuf,
    /// Verbatim command that produced `raw_file`.
    pub listing_command: String,
}

/// Progress state of a chunk of listing work.
///
/// Callers drive `Listing -> Listed -> Ingested`, or mark `Error`. The store
/// does not reject out-of-order updates; a retry simply starts again at
/// `Listing` for the same chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChunkStatus {
    /// Work claimed and listing started.
    Listing,
    /// Source enumeration finished.
    Listed,
    /// Listing written to the catalog.
    Ingested,
    /// Terminal failure marker.
    Error,
}

impl ChunkStatus {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Listed => "listed",
            Self::Ingested => "ingested",
            Self::Error => "error",
        }
    }

    /// Parse from the string stored in the database.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(Self::Listing),
            "listed" => Some(Self::Listed),
            "ingested" => Some(Self::Ingested),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Which set-once timestamp this transition stamps, if any.
    pub(crate) fn stamps(&self) -> ChunkStamp {
        match self {
            Self::Listing => ChunkStamp::StartedAt,
            Self::Listed => ChunkStamp::ListedAt,
            Self::Ingested => ChunkStamp::CompletedAt,
            Self::Error => ChunkStamp::None,
        }
    }
}

/// Set-once chunk timestamp columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkStamp {
    StartedAt,
    ListedAt,
    CompletedAt,
    None,
}

/// A request to move one chunk to a new status.
#[derive(Debug, Clone)]
pub struct ChunkUpdate {
    pub run: RunRecord,
    pub chunk_name: String,
    pub status: ChunkStatus,
}

/// One catalogued file, ready to be written for a run.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub modtime: String,
    pub classification: Classification,
}

impl FileEntry {
    pub fn new(record: ListingRecord, classification: Classification) -> Self {
        Self {
            path: record.path,
            size: record.size,
            modtime: record.modtime,
            classification,
        }
    }
}

/// A `runs` row as stored.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RunRow {
    pub remote: String,
    pub started_at: String,
    pub raw_file: String,
    pub rclone_command: String,
    pub completed_at: Option<String>,
}

/// A `chunks` row as stored.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub remote: String,
    pub rclone_command: String,
    pub raw_file: String,
    pub status: ChunkStatus,
    pub started_at: Option<String>,
    pub listed_at: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

/// A `files` row as stored.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: i64,
    pub remote: String,
    pub size: u64,
    pub modtime: String,
    pub ext: String,
    pub is_media: bool,
    pub media_kind: String,
    pub ignored_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationRules;

    #[test]
    fn test_chunk_status_round_trip() {
        for status in [
            ChunkStatus::Listing,
            ChunkStatus::Listed,
            ChunkStatus::Ingested,
            ChunkStatus::Error,
        ] {
            assert_eq!(ChunkStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_chunk_status_from_invalid() {
        assert_eq!(ChunkStatus::from_str("pending"), None);
    }

    #[test]
    fn test_chunk_status_stamps() {
        assert_eq!(ChunkStatus::Listing.stamps(), ChunkStamp::StartedAt);
        assert_eq!(ChunkStatus::Listed.stamps(), ChunkStamp::ListedAt);
        assert_eq!(ChunkStatus::Ingested.stamps(), ChunkStamp::CompletedAt);
        assert_eq!(ChunkStatus::Error.stamps(), ChunkStamp::None);
    }

    #[test]
    fn test_file_entry_from_record() {
        let record = ListingRecord {
            size: 42,
            modtime: "2024-01-02T03:04:05".to_string(),
            path: "x/clip.mp4".to_string(),
        };
        let classification = ClassificationRules::default().classify(&record.path);
        let entry = FileEntry::new(record, classification);
        assert_eq!(entry.path, "x/clip.mp4");
        assert_eq!(entry.size, 42);
        assert_eq!(entry.classification.ext, "mp4");
    }
}

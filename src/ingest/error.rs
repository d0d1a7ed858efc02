use std::path::PathBuf;

use thiserror::Error;

use crate::state::StateError;

/// Fatal ingest failures.
///
/// Malformed listing lines are not errors at this level; they are written to
/// the quarantine log and counted. Anything that reaches this type aborts
/// the run and leaves its `completed_at` unset.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open listing file {path}: {source}")]
    OpenRawFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open parse error log {path}: {source}")]
    OpenQuarantine {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read listing file: {0}")]
    Read(std::io::Error),

    #[error("Failed to write parse error log {path}: {source}")]
    Quarantine {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid ingest options: {0}")]
    Options(String),

    #[error(transparent)]
    State(#[from] StateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_path() {
        let e = IngestError::OpenRawFile {
            path: PathBuf::from("/data/raw/missing.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(e.to_string().contains("/data/raw/missing.txt"));
    }

    #[test]
    fn test_state_error_is_transparent() {
        let e = IngestError::from(StateError::Query("disk I/O error".into()));
        assert_eq!(e.to_string(), "Database query failed: disk I/O error");
    }
}

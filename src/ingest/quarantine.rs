//! Append-only log of listing lines that failed to parse.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::IngestError;
use crate::listing::ParseError;

/// File name of the parse error log for one `(source, run_id)`.
///
/// Path separators in either component become `_` so the log always lands
/// directly in the catalog directory.
pub fn log_file_name(source: &str, run_id: &str) -> String {
    format!(
        "parse_errors_{}_{}.log",
        file_name_component(source),
        file_name_component(run_id)
    )
}

fn file_name_component(value: &str) -> String {
    value.replace(['/', '\\'], "_")
}

/// Parse error log for a single ingest run.
///
/// Opened in append mode and never truncated, so repeated runs for the same
/// `(source, run_id)` accumulate. Each failure is one `write_all` of one line.
#[derive(Debug)]
pub struct QuarantineLog {
    file: File,
    path: PathBuf,
    written: u64,
}

impl QuarantineLog {
    pub async fn open(path: &Path) -> Result<Self, IngestError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| IngestError::OpenQuarantine {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Append one failure as a single line.
    pub async fn record(&mut self, error: &ParseError) -> Result<(), IngestError> {
        let line = format!("{error}\n");
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|source| IngestError::Quarantine {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    /// Number of lines appended by this handle.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered data to the OS.
    pub async fn finish(mut self) -> Result<(), IngestError> {
        self.file
            .flush()
            .await
            .map_err(|source| IngestError::Quarantine {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        assert_eq!(
            log_file_name("phone", "2024-06-01"),
            "parse_errors_phone_2024-06-01.log"
        );
    }

    #[test]
    fn test_log_file_name_replaces_separators() {
        assert_eq!(
            log_file_name("photos/2020", "r1"),
            "parse_errors_photos_2020_r1.log"
        );
        assert_eq!(
            log_file_name("../up", "a\\b"),
            "parse_errors_.._up_a_b.log"
        );
    }

    #[tokio::test]
    async fn test_nested_source_opens_in_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(log_file_name("photos/2020", "r1"));
        assert_eq!(path.parent(), Some(dir.path()));

        let log = QuarantineLog::open(&path).await.unwrap();
        log.finish().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(log_file_name("phone", "r1"));

        let mut log = QuarantineLog::open(&path).await.unwrap();
        log.record(&ParseError::Unparseable("garbage".into()))
            .await
            .unwrap();
        assert_eq!(log.written(), 1);
        log.finish().await.unwrap();

        let mut log = QuarantineLog::open(&path).await.unwrap();
        log.record(&ParseError::InvalidSize("x 2024-01-01 00:00:00 a".into()))
            .await
            .unwrap();
        log.finish().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Unparseable line: garbage\nInvalid size: x 2024-01-01 00:00:00 a\n"
        );
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("errors.log");
        let err = QuarantineLog::open(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::OpenQuarantine { .. }));
    }
}

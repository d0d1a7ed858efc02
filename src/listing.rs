//! Parser for `rclone lsl`-style listing output.
//!
//! Each line is `<size> <date> <time> <path>`, where the path is the rest of
//! the line and may itself contain whitespace:
//!
//! ```text
//!     12345 2024-01-02 03:04:05.000000000 Camera/IMG 0001.JPG
//! ```

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A successfully parsed listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    /// Size in bytes.
    pub size: u64,
    /// `<date>T<time>`; UTC is implied but not marked.
    pub modtime: String,
    /// Path relative to the listed remote, unmodified.
    pub path: String,
}

/// A line that could not be turned into a [`ListingRecord`].
///
/// The display form is exactly what gets written to the quarantine log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unparseable line: {0}")]
    Unparseable(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),
}

/// Parse one non-empty listing line.
pub fn parse_line(line: &str) -> Result<ListingRecord, ParseError> {
    let Some([size, date, time, path]) = split_fields(line) else {
        return Err(ParseError::Unparseable(line.to_string()));
    };

    // Negative sizes are integers, but not valid byte counts
    let size = size
        .parse::<i64>()
        .ok()
        .and_then(|s| u64::try_from(s).ok())
        .ok_or_else(|| ParseError::InvalidSize(line.to_string()))?;

    Ok(ListingRecord {
        size,
        modtime: format!("{date}T{time}"),
        path: path.to_string(),
    })
}

/// Split off three whitespace-delimited fields and keep the remainder as the
/// fourth. Returns `None` when fewer than four fields are present.
fn split_fields(line: &str) -> Option<[&str; 4]> {
    let mut rest = line;
    let mut fields = [""; 4];
    for field in fields.iter_mut().take(3) {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        *field = &rest[..end];
        rest = &rest[end..];
    }
    let path = rest.trim_start();
    if path.is_empty() {
        return None;
    }
    fields[3] = path;
    Some(fields)
}

/// One line read from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLine {
    Blank,
    Record(ListingRecord),
    Malformed(ParseError),
}

/// Lazily reads and parses a listing, one line per call.
///
/// Bytes are decoded as UTF-8 with invalid sequences replaced, so a stray
/// non-UTF-8 filename never aborts the stream. The reader cannot be rewound;
/// re-open the source to start again.
pub struct ListingReader<R> {
    inner: R,
    buf: Vec<u8>,
    lines_seen: u64,
}

impl<R: AsyncBufRead + Unpin> ListingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(512),
            lines_seen: 0,
        }
    }

    /// Number of lines read so far, blank lines included.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Read the next line. Returns `Ok(None)` at end of input.
    pub async fn next_line(&mut self) -> std::io::Result<Option<ListingLine>> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        self.lines_seen += 1;

        let mut bytes = self.buf.as_slice();
        if let Some(stripped) = bytes.strip_suffix(b"\n") {
            bytes = stripped;
        }
        if let Some(stripped) = bytes.strip_suffix(b"\r") {
            bytes = stripped;
        }
        if bytes.is_empty() {
            return Ok(Some(ListingLine::Blank));
        }

        let line = String::from_utf8_lossy(bytes);
        Ok(Some(match parse_line(&line) {
            Ok(record) => ListingLine::Record(record),
            Err(e) => ListingLine::Malformed(e),
        }))
    }
}

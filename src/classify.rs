//! Extension-based media classification.
//!
//! Classification looks only at the extension of the final path segment; file
//! contents are never inspected. The photo and video extension sets live in a
//! [`ClassificationRules`] value so callers can swap in their own lists.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_PHOTO_EXTS: &[&str] = &[
    "jpg", "jpeg", "heic", "heif", "png", "gif", "tif", "tiff", "bmp", "webp", "dng", "cr2", "cr3",
    "nef", "arw", "raf", "orf", "rw2", "pef", "sr2",
];

const DEFAULT_VIDEO_EXTS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mkv", "mpg", "mpeg", "3gp", "3gpp", "mts", "m2ts", "ts", "wmv",
    "flv", "webm",
];

/// Classification bucket derived from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Other,
}

impl MediaKind {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Other => "other",
        }
    }

    /// Parse from the string stored in the database.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Why a file was not classified as media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    NoExtension,
    NonMediaExtension,
}

impl IgnoredReason {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoExtension => "no_extension",
            Self::NonMediaExtension => "non_media_extension",
        }
    }
}

/// Result of classifying one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Lowercased extension without the dot; empty when there is none.
    pub ext: String,
    pub media_kind: MediaKind,
    /// `None` exactly when the file is media.
    pub ignored_reason: Option<IgnoredReason>,
}

impl Classification {
    pub fn is_media(&self) -> bool {
        self.ignored_reason.is_none()
    }

    /// The reason code as stored: empty for media files.
    pub fn ignored_reason_str(&self) -> &'static str {
        self.ignored_reason.map(|r| r.as_str()).unwrap_or("")
    }
}

/// Errors loading a rules file.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk shape of a rules file. Either list may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    photo: Option<Vec<String>>,
    video: Option<Vec<String>>,
}

/// Photo and video extension sets, lowercase and without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRules {
    photo: BTreeSet<String>,
    video: BTreeSet<String>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_PHOTO_EXTS.iter().copied(),
            DEFAULT_VIDEO_EXTS.iter().copied(),
        )
    }
}

impl ClassificationRules {
    /// Build a ruleset from explicit extension lists.
    ///
    /// Entries are normalised: surrounding whitespace and a leading dot are
    /// dropped and the rest is lowercased. Blank entries are ignored.
    pub fn new<P, V>(photo: P, video: V) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            photo: normalize_exts(photo),
            video: normalize_exts(video),
        }
    }

    /// Parse a TOML ruleset. A missing `photo` or `video` key keeps the default list.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let file: RulesFile = toml::from_str(s)?;
        let defaults = Self::default();
        Ok(Self {
            photo: file.photo.map(normalize_exts).unwrap_or(defaults.photo),
            video: file.video.map(normalize_exts).unwrap_or(defaults.video),
        })
    }

    /// Load a TOML ruleset from disk.
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| RulesError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn photo_count(&self) -> usize {
        self.photo.len()
    }

    pub fn video_count(&self) -> usize {
        self.video.len()
    }

    /// Classify a listing path by its extension. Total and deterministic.
    pub fn classify(&self, path: &str) -> Classification {
        // Listing paths are always '/'-separated, whatever the host OS.
        let base = path.rsplit('/').next().unwrap_or(path);
        let Some((_, ext)) = base.rsplit_once('.') else {
            return Classification {
                ext: String::new(),
                media_kind: MediaKind::Other,
                ignored_reason: Some(IgnoredReason::NoExtension),
            };
        };

        let ext = ext.to_lowercase();
        let (media_kind, ignored_reason) = if self.photo.contains(&ext) {
            (MediaKind::Photo, None)
        } else if self.video.contains(&ext) {
            (MediaKind::Video, None)
        } else {
            (MediaKind::Other, Some(IgnoredReason::NonMediaExtension))
        };

        Classification {
            ext,
            media_kind,
            ignored_reason,
        }
    }
}

fn normalize_exts<I>(exts: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    exts.into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

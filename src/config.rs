use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::classify::ClassificationRules;
use crate::cli::{ChunkArgs, IngestArgs, RunArgs, StoreArgs};
use crate::ingest::quarantine::log_file_name;
use crate::ingest::IngestOptions;
use crate::state::{ChunkUpdate, RunRecord};

/// Where the catalog lives and how long to wait on other writers.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
}

/// Fully resolved settings for an `ingest` invocation.
#[derive(Debug)]
pub struct IngestConfig {
    pub store: StoreConfig,
    pub run: RunRecord,
    pub options: IngestOptions,
    pub rules: ClassificationRules,
}

/// Fully resolved settings for a `chunk` invocation.
#[derive(Debug)]
pub struct ChunkConfig {
    pub store: StoreConfig,
    pub update: ChunkUpdate,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn require_non_empty(value: &str, flag: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("--{flag} must not be empty");
    }
    Ok(())
}

impl StoreConfig {
    fn from_args(args: StoreArgs) -> anyhow::Result<Self> {
        require_non_empty(&args.db, "db")?;
        Ok(Self {
            db_path: expand_tilde(&args.db),
            busy_timeout: Duration::from_secs(args.busy_timeout_secs),
        })
    }

    /// Directory holding the database file; side files are written here.
    pub fn db_dir(&self) -> &Path {
        self.db_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

fn run_record(args: RunArgs) -> anyhow::Result<RunRecord> {
    require_non_empty(&args.run_id, "run-id")?;
    require_non_empty(&args.source, "source")?;
    Ok(RunRecord {
        run_id: args.run_id,
        source: args.source,
        remote: args.remote,
        raw_file: args.raw_file,
        listing_command: args.rclone_command,
    })
}

impl IngestConfig {
    pub fn from_args(args: IngestArgs) -> anyhow::Result<Self> {
        let store = StoreConfig::from_args(args.store)?;
        let run = run_record(args.run)?;

        if args.batch_size == 0 {
            anyhow::bail!("--batch-size must be at least 1");
        }

        let rules = match &args.rules {
            Some(path) => ClassificationRules::load(&expand_tilde(&path.to_string_lossy()))
                .context("Cannot load classification rules")?,
            None => ClassificationRules::default(),
        };

        let quarantine_path = store
            .db_dir()
            .join(log_file_name(&run.source, &run.run_id));

        Ok(Self {
            store,
            run,
            options: IngestOptions {
                batch_size: args.batch_size,
                quarantine_path,
            },
            rules,
        })
    }
}

impl ChunkConfig {
    pub fn from_args(args: ChunkArgs) -> anyhow::Result<Self> {
        let store = StoreConfig::from_args(args.store)?;
        let run = run_record(args.run)?;
        require_non_empty(&args.chunk_name, "chunk-name")?;

        Ok(Self {
            store,
            update: ChunkUpdate {
                run,
                chunk_name: args.chunk_name,
                status: args.status,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChunkStatus;

    fn store_args(db: &str) -> StoreArgs {
        StoreArgs {
            db: db.to_string(),
            busy_timeout_secs: 5,
        }
    }

    fn run_args() -> RunArgs {
        RunArgs {
            run_id: "2024-06-01".to_string(),
            source: "phone".to_string(),
            remote: "gdrive:".to_string(),
            raw_file: PathBuf::from("/data/raw/phone.txt"),
            rclone_command: "rclone lsl gdrive:Photos".to_string(),
        }
    }

    fn ingest_args(db: &str) -> IngestArgs {
        IngestArgs {
            store: store_args(db),
            run: run_args(),
            batch_size: 1000,
            rules: None,
        }
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/catalog/media.db");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("catalog/media.db"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(
            expand_tilde("/absolute/path.db"),
            PathBuf::from("/absolute/path.db")
        );
        assert_eq!(expand_tilde("relative.db"), PathBuf::from("relative.db"));
    }

    #[test]
    fn test_quarantine_path_next_to_db() {
        let cfg = IngestConfig::from_args(ingest_args("/data/catalog/media.db")).unwrap();
        assert_eq!(
            cfg.options.quarantine_path,
            PathBuf::from("/data/catalog/parse_errors_phone_2024-06-01.log")
        );
        assert_eq!(cfg.store.busy_timeout, Duration::from_secs(5));
        assert_eq!(cfg.run.listing_command, "rclone lsl gdrive:Photos");
        assert_eq!(cfg.rules, ClassificationRules::default());
    }

    #[test]
    fn test_bare_db_name_uses_current_dir() {
        let cfg = IngestConfig::from_args(ingest_args("media.db")).unwrap();
        assert_eq!(
            cfg.options.quarantine_path,
            PathBuf::from("parse_errors_phone_2024-06-01.log")
        );
    }

    #[test]
    fn test_quarantine_path_stays_in_db_dir() {
        let mut args = ingest_args("/data/catalog/media.db");
        args.run.source = "photos/2020".to_string();
        let cfg = IngestConfig::from_args(args).unwrap();
        assert_eq!(
            cfg.options.quarantine_path,
            PathBuf::from("/data/catalog/parse_errors_photos_2020_2024-06-01.log")
        );
        // The run row keeps the source as given
        assert_eq!(cfg.run.source, "photos/2020");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut args = ingest_args("/data/media.db");
        args.batch_size = 0;
        assert!(IngestConfig::from_args(args).is_err());
    }

    #[test]
    fn test_empty_run_id_rejected() {
        let mut args = ingest_args("/data/media.db");
        args.run.run_id = " ".to_string();
        assert!(IngestConfig::from_args(args).is_err());
    }

    #[test]
    fn test_missing_rules_file_rejected() {
        let mut args = ingest_args("/data/media.db");
        args.rules = Some(PathBuf::from("/nonexistent/rules.toml"));
        let err = IngestConfig::from_args(args).unwrap_err();
        assert!(err.to_string().contains("classification rules"));
    }

    #[test]
    fn test_chunk_config() {
        let cfg = ChunkConfig::from_args(ChunkArgs {
            store: store_args("/data/media.db"),
            run: run_args(),
            chunk_name: "part-007".to_string(),
            status: ChunkStatus::Listing,
        })
        .unwrap();
        assert_eq!(cfg.update.chunk_name, "part-007");
        assert_eq!(cfg.update.status, ChunkStatus::Listing);
        assert_eq!(cfg.update.run.source, "phone");
    }

    #[test]
    fn test_chunk_config_empty_name_rejected() {
        let result = ChunkConfig::from_args(ChunkArgs {
            store: store_args("/data/media.db"),
            run: run_args(),
            chunk_name: String::new(),
            status: ChunkStatus::Listed,
        });
        assert!(result.is_err());
    }
}

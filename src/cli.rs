use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::ingest::DEFAULT_BATCH_SIZE;
use crate::state::ChunkStatus;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "media-catalog",
    version,
    about = "Catalog remote file listings into a SQLite media index"
)]
pub struct Cli {
    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a raw listing file into the catalog
    Ingest(IngestArgs),

    /// Record a chunk status transition without ingesting anything
    Chunk(ChunkArgs),
}

/// Location and connection settings for the catalog database.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to the SQLite catalog (created if missing)
    #[arg(long, env = "MEDIA_CATALOG_DB")]
    pub db: String,

    /// Seconds to wait for another writer's lock before failing
    #[arg(long, default_value_t = 30)]
    pub busy_timeout_secs: u64,
}

/// Identity and provenance of the listing run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Run identifier shared by every chunk of one listing job
    #[arg(long)]
    pub run_id: String,

    /// Name of the source being catalogued
    #[arg(long)]
    pub source: String,

    /// Storage remote the listing was taken from
    #[arg(long)]
    pub remote: String,

    /// Raw listing file produced by the listing tool
    #[arg(long)]
    pub raw_file: PathBuf,

    /// Exact command that produced the raw listing file
    #[arg(long, visible_alias = "listing-command")]
    pub rclone_command: String,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Records committed per transaction
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// TOML file overriding the photo/video extension lists
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Chunk within the run whose progress is being recorded
    #[arg(long)]
    pub chunk_name: String,

    /// New status for the chunk
    #[arg(long, value_enum)]
    pub status: ChunkStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &[&str] = &[
        "--db",
        "/data/catalog.db",
        "--run-id",
        "2024-06-01",
        "--source",
        "phone",
        "--remote",
        "gdrive:",
        "--raw-file",
        "/data/raw/phone.txt",
        "--rclone-command",
        "rclone lsl gdrive:Photos",
    ];

    fn parse(cmd: &str, extra: &[&str]) -> Result<Cli, clap::Error> {
        let args = ["media-catalog", cmd]
            .into_iter()
            .chain(RUN.iter().copied())
            .chain(extra.iter().copied());
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_ingest_defaults() {
        let cli = parse("ingest", &[]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Info);
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.store.db, "/data/catalog.db");
                assert_eq!(args.store.busy_timeout_secs, 30);
                assert_eq!(args.run.run_id, "2024-06-01");
                assert_eq!(args.run.rclone_command, "rclone lsl gdrive:Photos");
                assert_eq!(args.batch_size, 1000);
                assert!(args.rules.is_none());
            }
            other => panic!("expected ingest, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_status_parsed() {
        let cli = parse("chunk", &["--chunk-name", "part-003", "--status", "listed"]).unwrap();
        match cli.command {
            Command::Chunk(args) => {
                assert_eq!(args.chunk_name, "part-003");
                assert_eq!(args.status, ChunkStatus::Listed);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_chunk_requires_name_and_status() {
        assert!(parse("chunk", &["--status", "listing"]).is_err());
        assert!(parse("chunk", &["--chunk-name", "c1"]).is_err());
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(parse("chunk", &["--chunk-name", "c1", "--status", "done"]).is_err());
    }

    #[test]
    fn test_ingest_requires_raw_file() {
        let result = Cli::try_parse_from([
            "media-catalog",
            "ingest",
            "--db",
            "x.db",
            "--run-id",
            "r",
            "--source",
            "s",
            "--remote",
            "m:",
            "--rclone-command",
            "rclone lsl m:",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_log_level_after_subcommand() {
        let cli = parse("ingest", &["--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_listing_command_alias() {
        let cli = Cli::try_parse_from([
            "media-catalog",
            "ingest",
            "--db",
            "x.db",
            "--run-id",
            "r",
            "--source",
            "s",
            "--remote",
            "m:",
            "--raw-file",
            "raw.txt",
            "--listing-command",
            "rclone lsl m:",
        ])
        .unwrap();
        match cli.command {
            Command::Ingest(args) => assert_eq!(args.run.rclone_command, "rclone lsl m:"),
            other => panic!("expected ingest, got {other:?}"),
        }
    }
}

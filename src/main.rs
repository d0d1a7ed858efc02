//! media-catalog: ingest remote file listings into a SQLite media catalog.
//!
//! An external listing tool (typically `rclone lsl`) writes one raw listing
//! file per chunk of a source. This binary records each chunk's progress and
//! streams the listing into a deduplicated `files` table, classifying every
//! entry as photo, video or other by extension. Many invocations may share
//! one catalog file concurrently.

#![warn(clippy::all)]

mod classify;
mod cli;
mod config;
mod ingest;
mod listing;
mod state;
mod types;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::{ChunkConfig, IngestConfig, StoreConfig};
use state::{CatalogDb, SqliteCatalogDb};

async fn open_store(store: &StoreConfig) -> anyhow::Result<SqliteCatalogDb> {
    let db = SqliteCatalogDb::open(&store.db_path, store.busy_timeout)
        .await
        .with_context(|| format!("Cannot open catalog at {}", store.db_path.display()))?;
    tracing::debug!("Catalog opened at {}", db.path().display());
    Ok(db)
}

/// Run the ingest command.
async fn run_ingest(args: cli::IngestArgs) -> anyhow::Result<()> {
    let config = IngestConfig::from_args(args)?;
    tracing::debug!(
        photo_exts = config.rules.photo_count(),
        video_exts = config.rules.video_count(),
        batch_size = config.options.batch_size,
        "Ingest configuration resolved"
    );

    let db = open_store(&config.store).await?;
    let stats = ingest::ingest(&db, &config.rules, &config.run, &config.options)
        .await
        .with_context(|| {
            format!(
                "Ingest failed for run {} source {}",
                config.run.run_id, config.run.source
            )
        })?;

    println!(
        "Ingested {} records from {} lines.",
        stats.records_inserted, stats.lines_seen
    );
    Ok(())
}

/// Run the chunk command.
async fn run_chunk(args: cli::ChunkArgs) -> anyhow::Result<()> {
    let config = ChunkConfig::from_args(args)?;
    let db = open_store(&config.store).await?;

    db.advance_chunk(&config.update).await.with_context(|| {
        format!(
            "Cannot record status {} for chunk {}",
            config.update.status.as_str(),
            config.update.chunk_name
        )
    })?;

    tracing::info!(
        run_id = %config.update.run.run_id,
        source = %config.update.run.source,
        chunk = %config.update.chunk_name,
        status = config.update.status.as_str(),
        "Chunk status recorded"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest(args) => run_ingest(args).await,
        Command::Chunk(args) => run_chunk(args).await,
    }
}

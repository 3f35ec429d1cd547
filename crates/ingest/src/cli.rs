use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressStyle;
use retouch_core::retry::RetryPolicy;
use retouch_pipeline::ingest::{parse_photos_tsv, PhotoRow};

#[derive(Parser, Debug)]
#[command(name = "retouch-ingest", version, about = "Caption and embed catalog images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Caption each photo into `<jsons>/<id>.json`, skipping existing files
    Describe(IngestArgs),
    /// Embed stored captions and insert them into the catalog
    Embed(IngestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Tab-separated photo export (id in column 0, URL in column 2)
    #[arg(long, default_value = "photos.tsv")]
    pub photos: PathBuf,
    /// Directory holding one caption JSON per photo
    #[arg(long, default_value = "jsons")]
    pub jsons: PathBuf,
    /// Photos processed concurrently
    #[arg(short, long, default_value_t = 4)]
    pub concurrency: usize,
    /// Attempts per upstream call, including the first
    #[arg(long, default_value_t = 5, env = "INGEST_MAX_ATTEMPTS")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,
}

impl IngestArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Per-run tally printed when a pass finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} written, {} skipped, {} failed",
            self.written, self.skipped, self.failed
        )
    }
}

/// Log the tally and fail the process when any row failed, so batch
/// runs exit non-zero. Rerunning retries only the failed rows.
pub fn finish(pass: &str, summary: Summary) -> anyhow::Result<()> {
    tracing::info!(
        pass,
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed,
        "Pass finished"
    );
    if summary.failed > 0 {
        anyhow::bail!("{pass} pass: {} photo(s) failed ({summary})", summary.failed);
    }
    Ok(())
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

pub async fn load_rows(path: &Path) -> anyhow::Result<Vec<PhotoRow>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows = parse_photos_tsv(&contents)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Loaded photo export");
    Ok(rows)
}

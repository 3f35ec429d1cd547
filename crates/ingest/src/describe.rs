//! `describe` pass: photo URL -> caption JSON on disk.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use retouch_pipeline::ingest::{caption_path, Describer, PhotoRow};
use retouch_upstream::config::{upstream_timeout_from_env, OpenAiConfig};
use retouch_upstream::openai::OpenAiCaptioner;

use crate::cli::{finish, load_rows, pb_style, IngestArgs, Summary};

pub async fn run(args: IngestArgs) -> anyhow::Result<()> {
    let rows = load_rows(&args.photos).await?;
    tokio::fs::create_dir_all(&args.jsons)
        .await
        .with_context(|| format!("Failed to create {}", args.jsons.display()))?;

    let http = retouch_upstream::build_http_client(upstream_timeout_from_env()?)
        .context("Failed to build HTTP client")?;
    let captioner = OpenAiCaptioner::with_client(http, OpenAiConfig::from_env()?);
    let describer = Describer::new(Arc::new(captioner), args.retry_policy());

    let summary = describe_all(&describer, rows, &args.jsons, args.concurrency).await?;
    finish("describe", summary)
}

/// Caption every row without a caption file. Individual failures are logged
/// and counted; they do not stop the pass.
pub async fn describe_all(
    describer: &Describer,
    rows: Vec<PhotoRow>,
    dir: &Path,
    concurrency: usize,
) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    let mut pending = Vec::with_capacity(rows.len());
    for row in rows {
        if tokio::fs::try_exists(caption_path(dir, &row.id)?).await? {
            summary.skipped += 1;
        } else {
            pending.push(row);
        }
    }

    let pb = ProgressBar::new(pending.len() as u64).with_style(pb_style());
    let outcomes: Vec<(PhotoRow, anyhow::Result<()>)> = stream::iter(pending)
        .map(|row| {
            let pb = pb.clone();
            async move {
                let outcome = describe_one(describer, &row, dir).await;
                pb.inc(1);
                (row, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (row, outcome) in outcomes {
        match outcome {
            Ok(()) => summary.written += 1,
            Err(e) => {
                tracing::warn!(id = %row.id, url = %row.url, error = %e, "Failed to describe photo");
                summary.failed += 1;
            }
        }
    }

    pb.finish_with_message(summary.to_string());
    Ok(summary)
}

async fn describe_one(describer: &Describer, row: &PhotoRow, dir: &Path) -> anyhow::Result<()> {
    let description = describer.describe(row).await?;
    let json = serde_json::to_vec_pretty(&description)?;
    tokio::fs::write(caption_path(dir, &row.id)?, json).await?;
    tracing::debug!(id = %row.id, category = %description.category, "Caption written");
    Ok(())
}

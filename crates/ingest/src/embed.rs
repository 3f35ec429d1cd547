//! `embed` pass: caption JSON -> embedding -> catalog row.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use retouch_core::catalog::ImageDescription;
use retouch_db::DatabaseConfig;
use retouch_pipeline::ingest::{
    build_record, caption_path, CatalogWriter, DocumentEmbedder, PgCatalogWriter, PhotoRow,
};
use retouch_upstream::config::{upstream_timeout_from_env, OllamaConfig};
use retouch_upstream::ollama::OllamaEmbedder;

use crate::cli::{finish, load_rows, pb_style, IngestArgs, Summary};

pub async fn run(args: IngestArgs) -> anyhow::Result<()> {
    let rows = load_rows(&args.photos).await?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = retouch_db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    retouch_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let http = retouch_upstream::build_http_client(upstream_timeout_from_env()?)
        .context("Failed to build HTTP client")?;
    let embedder = OllamaEmbedder::with_client(http, OllamaConfig::from_env());
    let documents = DocumentEmbedder::new(Arc::new(embedder), args.retry_policy());
    let writer = PgCatalogWriter::new(pool);

    let summary = embed_all(&documents, &writer, rows, &args.jsons, args.concurrency).await;
    finish("embed", summary)
}

enum Outcome {
    Inserted,
    Skipped,
}

/// Embed and store every captioned row. Rows without a caption file or
/// already in the catalog are skipped.
pub async fn embed_all(
    documents: &DocumentEmbedder,
    writer: &dyn CatalogWriter,
    rows: Vec<PhotoRow>,
    dir: &Path,
    concurrency: usize,
) -> Summary {
    let pb = ProgressBar::new(rows.len() as u64).with_style(pb_style());
    let outcomes: Vec<(PhotoRow, anyhow::Result<Outcome>)> = stream::iter(rows)
        .map(|row| {
            let pb = pb.clone();
            async move {
                let outcome = embed_one(documents, writer, &row, dir).await;
                pb.inc(1);
                (row, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = Summary::default();
    for (row, outcome) in outcomes {
        match outcome {
            Ok(Outcome::Inserted) => summary.written += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                tracing::warn!(id = %row.id, error = %e, "Failed to embed photo");
                summary.failed += 1;
            }
        }
    }

    pb.finish_with_message(summary.to_string());
    summary
}

async fn embed_one(
    documents: &DocumentEmbedder,
    writer: &dyn CatalogWriter,
    row: &PhotoRow,
    dir: &Path,
) -> anyhow::Result<Outcome> {
    let path = caption_path(dir, &row.id)?;
    if !tokio::fs::try_exists(&path).await? {
        tracing::debug!(id = %row.id, "No caption yet");
        return Ok(Outcome::Skipped);
    }
    if writer.exists(&row.id).await? {
        return Ok(Outcome::Skipped);
    }

    let bytes = tokio::fs::read(&path).await?;
    let description: ImageDescription = serde_json::from_slice(&bytes)
        .with_context(|| format!("Malformed caption {}", path.display()))?;
    let description = description.validate()?;

    let embedding = documents.embed(row, &description).await?;
    let record = build_record(row, description, embedding);
    if writer.insert(&record).await? {
        Ok(Outcome::Inserted)
    } else {
        Ok(Outcome::Skipped)
    }
}

//! Catalog ingestion steps shared by the batch tool.
//!
//! Two passes over a `photos.tsv` export:
//! 1. describe -- caption each photo URL into an [`ImageDescription`];
//! 2. embed -- embed the description and build the insert DTO.
//!
//! Backend calls run through a [`RetryPolicy`]; only transient upstream
//! failures are retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use retouch_core::catalog::{validate_embedding_dimension, ImageDescription, DOCUMENT_PREFIX};
use retouch_core::error::CoreError;
use retouch_core::retry::{retry, RetryPolicy};
use retouch_db::models::image::CreateImageRecord;
use retouch_db::repositories::ImageRepo;
use retouch_db::DbPool;
use retouch_upstream::backend::{CaptionBackend, EmbeddingBackend};
use retouch_upstream::UpstreamError;

use crate::error::PipelineError;

/// Column holding the photo id in `photos.tsv`.
const ID_COLUMN: usize = 0;
/// Column holding the photo URL in `photos.tsv`.
const URL_COLUMN: usize = 2;

/// One photo from the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRow {
    pub id: String,
    pub url: String,
}

/// Parse a tab-separated export. The first line is a header; blank lines
/// are skipped.
pub fn parse_photos_tsv(contents: &str) -> Result<Vec<PhotoRow>, CoreError> {
    contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let columns: Vec<&str> = line.split('\t').collect();
            let field = |column: usize| {
                columns
                    .get(column)
                    .map(|value| value.trim())
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| {
                        CoreError::InvalidInput(format!(
                            "photos.tsv line {}: missing column {column}",
                            index + 1
                        ))
                    })
            };
            let id = field(ID_COLUMN)?;
            validate_photo_id(id).map_err(|e| {
                CoreError::InvalidInput(format!("photos.tsv line {}: {e}", index + 1))
            })?;
            Ok(PhotoRow {
                id: id.to_string(),
                url: field(URL_COLUMN)?.to_string(),
            })
        })
        .collect()
}

/// Photo ids become file names, so they may not name a directory.
pub fn validate_photo_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(CoreError::InvalidInput(format!(
            "photo id '{id}' is not a plain file name"
        )));
    }
    Ok(())
}

/// Location of the caption file for `id`, always directly inside `dir`.
pub fn caption_path(dir: &Path, id: &str) -> Result<PathBuf, CoreError> {
    validate_photo_id(id)?;
    Ok(dir.join(format!("{id}.json")))
}

/// Assemble the insert DTO for a captioned, embedded photo.
pub fn build_record(
    row: &PhotoRow,
    description: ImageDescription,
    embedding: Vec<f32>,
) -> CreateImageRecord {
    CreateImageRecord {
        id: row.id.clone(),
        url: row.url.clone(),
        description: description.description,
        category: description.category,
        embedding,
    }
}

/// Captions photos through the vision backend.
pub struct Describer {
    captioner: Arc<dyn CaptionBackend>,
    policy: RetryPolicy,
}

impl Describer {
    pub fn new(captioner: Arc<dyn CaptionBackend>, policy: RetryPolicy) -> Self {
        Self { captioner, policy }
    }

    pub async fn describe(&self, row: &PhotoRow) -> Result<ImageDescription, PipelineError> {
        let label = format!("describe {}", row.id);
        let description = retry(&self.policy, &label, UpstreamError::is_transient, || {
            self.captioner.describe(&row.url)
        })
        .await?;
        Ok(description)
    }
}

/// Embeds captions as search documents.
pub struct DocumentEmbedder {
    embedder: Arc<dyn EmbeddingBackend>,
    policy: RetryPolicy,
}

impl DocumentEmbedder {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, policy: RetryPolicy) -> Self {
        Self { embedder, policy }
    }

    pub async fn embed(
        &self,
        row: &PhotoRow,
        description: &ImageDescription,
    ) -> Result<Vec<f32>, PipelineError> {
        let label = format!("embed {}", row.id);
        let text = format!("{DOCUMENT_PREFIX}{}", description.description);
        let embedding = retry(&self.policy, &label, UpstreamError::is_transient, || {
            self.embedder.embed(&text)
        })
        .await?;
        validate_embedding_dimension(&embedding)?;
        Ok(embedding)
    }
}

/// Storage seam for ingestion writes.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    async fn exists(&self, id: &str) -> Result<bool, sqlx::Error>;

    /// Insert unless the id is already stored. Returns `true` when written.
    async fn insert(&self, record: &CreateImageRecord) -> Result<bool, sqlx::Error>;
}

/// [`CatalogWriter`] backed by PostgreSQL.
pub struct PgCatalogWriter {
    pool: DbPool,
}

impl PgCatalogWriter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogWriter for PgCatalogWriter {
    async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        ImageRepo::exists(&self.pool, id).await
    }

    async fn insert(&self, record: &CreateImageRecord) -> Result<bool, sqlx::Error> {
        ImageRepo::insert(&self.pool, record).await
    }
}

//! Catalog reads: random sample and text-to-image nearest-neighbour search.
//!
//! Query embeddings are computed here through the embedding backend; the
//! distance ranking runs in the store (pgvector `<=>`).

use std::sync::Arc;

use async_trait::async_trait;
use retouch_core::catalog::{
    clamp_limit, display_url, validate_embedding_dimension, Category, QUERY_PREFIX,
};
use retouch_core::error::CoreError;
use retouch_db::models::image::{ImageRecord, ImageSearchHit};
use retouch_db::repositories::ImageRepo;
use retouch_db::DbPool;
use retouch_upstream::backend::EmbeddingBackend;
use retouch_upstream::UpstreamError;
use serde::Serialize;

use crate::error::PipelineError;

/// Backend name reported when a query embedding has the wrong shape.
const EMBEDDING_BACKEND: &str = "embedding";

/// Storage seam for catalog reads.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn random_sample(&self, limit: i64) -> Result<Vec<ImageRecord>, sqlx::Error>;

    async fn search_nearest(
        &self,
        embedding: &[f32],
        limit: i64,
        category: Option<Category>,
    ) -> Result<Vec<ImageSearchHit>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// [`CatalogStore`] backed by PostgreSQL.
pub struct PgCatalogStore {
    pool: DbPool,
}

impl PgCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn random_sample(&self, limit: i64) -> Result<Vec<ImageRecord>, sqlx::Error> {
        ImageRepo::random_sample(&self.pool, limit).await
    }

    async fn search_nearest(
        &self,
        embedding: &[f32],
        limit: i64,
        category: Option<Category>,
    ) -> Result<Vec<ImageSearchHit>, sqlx::Error> {
        ImageRepo::search_nearest(&self.pool, embedding, limit, category.map(|c| c.label())).await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        retouch_db::health_check(&self.pool).await
    }
}

/// A catalog entry as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogImage {
    pub id: String,
    /// Stored URL with the display-size suffix appended.
    pub url: String,
    pub category: String,
    pub description: String,
    /// Cosine distance to the query; present on search results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl From<ImageRecord> for CatalogImage {
    fn from(record: ImageRecord) -> Self {
        Self {
            url: display_url(&record.url),
            id: record.id,
            category: record.category,
            description: record.description,
            distance: None,
        }
    }
}

impl From<ImageSearchHit> for CatalogImage {
    fn from(hit: ImageSearchHit) -> Self {
        Self {
            url: display_url(&hit.url),
            id: hit.id,
            category: hit.category,
            description: hit.description,
            distance: Some(hit.distance),
        }
    }
}

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { store, embedder }
    }

    /// Up to `limit` (clamped) records chosen uniformly at random.
    pub async fn random_sample(&self, limit: Option<i64>) -> Result<Vec<CatalogImage>, PipelineError> {
        let limit = clamp_limit(limit);
        let records = self.store.random_sample(limit).await?;
        Ok(records.into_iter().map(CatalogImage::from).collect())
    }

    /// Records nearest to `query` by cosine distance, ascending.
    ///
    /// `category` must be one of the fixed labels when given.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
        category: Option<&str>,
    ) -> Result<Vec<CatalogImage>, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidInput("Search query must not be empty".into()).into());
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Category::parse)
            .transpose()?;
        let limit = clamp_limit(limit);

        let embedding = self.embedder.embed(&format!("{QUERY_PREFIX}{query}")).await?;
        validate_embedding_dimension(&embedding)
            .map_err(|e| UpstreamError::invalid(EMBEDDING_BACKEND, e.to_string()))?;

        let hits = self.store.search_nearest(&embedding, limit, category).await?;
        tracing::debug!(query, limit, category = ?category, hits = hits.len(), "Catalog search");
        Ok(hits.into_iter().map(CatalogImage::from).collect())
    }

    pub async fn ping(&self) -> Result<(), PipelineError> {
        self.store.ping().await?;
        Ok(())
    }
}

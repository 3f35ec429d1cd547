//! Catalog image rows.

use chrono::{DateTime, Utc};
use retouch_core::catalog::Category;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `images` table (without the embedding column).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    pub description: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// A nearest-neighbour hit with its cosine distance to the query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageSearchHit {
    pub id: String,
    pub url: String,
    pub description: String,
    pub category: String,
    pub distance: f64,
}

/// DTO for inserting a captioned, embedded image.
#[derive(Debug, Clone)]
pub struct CreateImageRecord {
    pub id: String,
    pub url: String,
    pub description: String,
    pub category: Category,
    pub embedding: Vec<f32>,
}

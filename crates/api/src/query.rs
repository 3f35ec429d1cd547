//! Query parameter types for the catalog endpoints.
//!
//! Limits are clamped in the catalog service via `clamp_limit`.

use serde::Deserialize;

/// `?limit=` for `GET /api/image/random`.
#[derive(Debug, Deserialize)]
pub struct RandomParams {
    pub limit: Option<i64>,
}

/// `?query=&limit=&category=` for `GET /api/image/search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

//! Handlers for catalog browsing.
//!
//! Endpoints:
//! - GET /api/image/random?limit=
//! - GET /api/image/search?query=&limit=&category=

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use retouch_pipeline::catalog::CatalogImage;
use serde::Serialize;

use crate::error::AppResult;
use crate::query::{RandomParams, SearchParams};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub images: Vec<CatalogImage>,
}

/// GET /api/image/random
pub async fn random(
    State(state): State<AppState>,
    params: Result<Query<RandomParams>, QueryRejection>,
) -> AppResult<Json<ImagesResponse>> {
    let Query(params) = params?;
    let images = state.catalog.random_sample(params.limit).await?;
    Ok(Json(ImagesResponse { images }))
}

/// GET /api/image/search
///
/// Results are ordered by ascending cosine distance and carry `distance`.
pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> AppResult<Json<ImagesResponse>> {
    let Query(params) = params?;
    let images = state
        .catalog
        .search(&params.query, params.limit, params.category.as_deref())
        .await?;
    Ok(Json(ImagesResponse { images }))
}

//! Handlers for image edit operations.
//!
//! Endpoints:
//! - POST /api/image/edit
//! - POST /api/image/edit_without_mask
//! - POST /api/image/upscale

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use retouch_core::mask::Polygon;
use retouch_pipeline::edit::EditResult;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

/// Body for `POST /api/image/edit`.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub image_url: String,
    /// Regions to regenerate, each a list of `[x, y]` points.
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    pub prompt: String,
    /// Normalize the prompt into an English instruction before editing.
    #[serde(default)]
    pub rewrite_prompt: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditWithoutMaskRequest {
    pub image_url: String,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct UpscaleRequest {
    pub image_url: String,
}

/// `{url}` for hosted results, `{base64}` for inline PNG bytes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EditResponse {
    Url { url: String },
    Inline { base64: String },
}

impl From<EditResult> for EditResponse {
    fn from(result: EditResult) -> Self {
        match result {
            EditResult::Url(url) => Self::Url { url },
            EditResult::Inline { bytes, .. } => Self::Inline {
                base64: BASE64.encode(bytes),
            },
        }
    }
}

/// POST /api/image/edit
///
/// Rasterize the polygons into a mask (black = editable) and send image,
/// mask and prompt to the masked-edit backend.
pub async fn edit(
    State(state): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> AppResult<Json<EditResponse>> {
    let Json(input) = payload?;
    tracing::info!(
        image_url = %input.image_url,
        polygons = input.polygons.len(),
        rewrite_prompt = input.rewrite_prompt,
        "Masked edit requested",
    );

    let result = state
        .edits
        .edit_with_polygons(
            &input.image_url,
            &input.polygons,
            &input.prompt,
            input.rewrite_prompt,
        )
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/image/edit_without_mask
pub async fn edit_without_mask(
    State(state): State<AppState>,
    payload: Result<Json<EditWithoutMaskRequest>, JsonRejection>,
) -> AppResult<Json<EditResponse>> {
    let Json(input) = payload?;
    tracing::info!(image_url = %input.image_url, "Mask-free edit requested");

    let result = state
        .edits
        .edit_without_mask(&input.image_url, &input.prompt)
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/image/upscale
pub async fn upscale(
    State(state): State<AppState>,
    payload: Result<Json<UpscaleRequest>, JsonRejection>,
) -> AppResult<Json<EditResponse>> {
    let Json(input) = payload?;
    tracing::info!(image_url = %input.image_url, "Upscale requested");

    let result = state.edits.upscale(&input.image_url).await?;
    Ok(Json(result.into()))
}

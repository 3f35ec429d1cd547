pub mod health;
pub mod image;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /image/edit                  masked edit (POST)
/// /image/edit_without_mask     mask-free edit (POST)
/// /image/upscale               upscale (POST)
/// /image/random                random catalog sample (GET)
/// /image/search                text search over the catalog (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/image", image::router())
}

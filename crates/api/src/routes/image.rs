use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Routes mounted at `/api/image`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/edit", post(handlers::image::edit))
        .route("/edit_without_mask", post(handlers::image::edit_without_mask))
        .route("/upscale", post(handlers::image::upscale))
        .route("/random", get(handlers::catalog::random))
        .route("/search", get(handlers::catalog::search))
}

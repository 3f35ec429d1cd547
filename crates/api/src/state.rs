use std::sync::Arc;

use retouch_pipeline::catalog::CatalogService;
use retouch_pipeline::edit::EditService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; services sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Edit, mask-free edit and upscale flows.
    pub edits: Arc<EditService>,
    /// Random sample and search over the image catalog.
    pub catalog: Arc<CatalogService>,
}

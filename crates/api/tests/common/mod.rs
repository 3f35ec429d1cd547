//! Shared harness for API integration tests.
//!
//! Builds the production router around in-memory backend doubles so the
//! full middleware stack runs without network or database access.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use retouch_api::config::ServerConfig;
use retouch_api::router::build_app_router;
use retouch_api::state::AppState;
use retouch_core::catalog::{Category, EMBEDDING_DIMENSION};
use retouch_db::models::image::{ImageRecord, ImageSearchHit};
use retouch_pipeline::catalog::{CatalogService, CatalogStore};
use retouch_pipeline::edit::{EditOrchestrator, EditService};
use retouch_pipeline::rewrite::PromptRewriter;
use retouch_upstream::backend::{
    EmbeddingBackend, GenerativeEditBackend, ImageFetcher, InlineImage,
    InstructionRewriteBackend, MaskedEditBackend, UpscaleBackend,
};
use retouch_upstream::UpstreamError;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

/// Configurable behaviour shared by every double.
#[derive(Default)]
pub struct Doubles {
    /// Make the masked-edit backend answer with this upstream error.
    pub masked_error: Mutex<Option<UpstreamError>>,
    /// Make the masked-edit backend stall this long before answering.
    pub masked_delay: Option<Duration>,
    /// Last `(mask, prompt)` the masked-edit backend received.
    pub masked_seen: Mutex<Option<(Vec<u8>, String)>>,
    /// Make the store's ping fail.
    pub db_down: bool,
    /// Last `(limit, category)` passed to the store's search.
    pub search_seen: Mutex<Option<(i64, Option<Category>)>>,
}

struct Fetcher;

#[async_trait]
impl ImageFetcher for Fetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, UpstreamError> {
        Ok(png(16, 16))
    }
}

struct Masked(Arc<Doubles>);

#[async_trait]
impl MaskedEditBackend for Masked {
    async fn edit_with_mask(
        &self,
        _image: &[u8],
        mask: &[u8],
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        *self.0.masked_seen.lock().unwrap() = Some((mask.to_vec(), prompt.to_string()));
        if let Some(delay) = self.0.masked_delay {
            tokio::time::sleep(delay).await;
        }
        match self.0.masked_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok("https://edits.example/result.png".into()),
        }
    }
}

struct Generative;

#[async_trait]
impl GenerativeEditBackend for Generative {
    async fn edit_without_mask(&self, _image: &[u8], _prompt: &str) -> Result<InlineImage, UpstreamError> {
        Ok(InlineImage {
            bytes: png(4, 3),
            mime_type: Some("image/png".into()),
        })
    }
}

struct Upscale;

#[async_trait]
impl UpscaleBackend for Upscale {
    async fn upscale(&self, _image: &[u8]) -> Result<String, UpstreamError> {
        Ok("https://edits.example/upscaled.png".into())
    }
}

struct Rewrite;

#[async_trait]
impl InstructionRewriteBackend for Rewrite {
    async fn rewrite_instruction(
        &self,
        _image: &[u8],
        _mask: &[u8],
        instruction: &str,
    ) -> Result<String, UpstreamError> {
        Ok(format!(r#"{{"instruction": "rewritten: {instruction}"}}"#))
    }
}

struct Embedder;

#[async_trait]
impl EmbeddingBackend for Embedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, UpstreamError> {
        Ok(vec![0.0; EMBEDDING_DIMENSION])
    }
}

struct Store(Arc<Doubles>);

#[async_trait]
impl CatalogStore for Store {
    async fn random_sample(&self, limit: i64) -> Result<Vec<ImageRecord>, sqlx::Error> {
        Ok((0..limit.min(3))
            .map(|i| ImageRecord {
                id: format!("r{i}"),
                url: format!("https://images.example/r{i}"),
                description: format!("random {i}"),
                category: "Travel".into(),
                created_at: chrono::Utc::now(),
            })
            .collect())
    }

    async fn search_nearest(
        &self,
        _embedding: &[f32],
        limit: i64,
        category: Option<Category>,
    ) -> Result<Vec<ImageSearchHit>, sqlx::Error> {
        *self.0.search_seen.lock().unwrap() = Some((limit, category));
        Ok(vec![
            ImageSearchHit {
                id: "near".into(),
                url: "https://images.example/near".into(),
                description: "closest".into(),
                category: "Nature".into(),
                distance: 0.05,
            },
            ImageSearchHit {
                id: "far".into(),
                url: "https://images.example/far".into(),
                description: "further".into(),
                category: "Nature".into(),
                distance: 0.6,
            },
        ])
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.0.db_down {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// App construction and request helpers
// ---------------------------------------------------------------------------

/// Build the full application router wired to the given doubles.
pub fn build_test_app(doubles: Arc<Doubles>) -> Router {
    build_test_app_with_config(doubles, test_config())
}

pub fn build_test_app_with_config(doubles: Arc<Doubles>, config: ServerConfig) -> Router {

    let orchestrator = EditOrchestrator::new(Arc::new(Masked(doubles.clone())), Arc::new(Generative));
    let edits = EditService::new(orchestrator, Arc::new(Upscale), Arc::new(Fetcher))
        .with_rewriter(PromptRewriter::new(Arc::new(Rewrite)));
    let catalog = CatalogService::new(Arc::new(Store(doubles)), Arc::new(Embedder));

    let state = AppState {
        edits: Arc::new(edits),
        catalog: Arc::new(catalog),
    };
    build_app_router(state, &config)
}

pub fn default_app() -> Router {
    build_test_app(Arc::new(Doubles::default()))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

//! Backend seams.
//!
//! Pipeline services depend on these traits rather than on concrete
//! clients, so tests can substitute in-memory doubles.

use async_trait::async_trait;
use retouch_core::catalog::ImageDescription;

use crate::error::UpstreamError;

/// Image bytes returned inline by a generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Edits the masked region of an image and returns a URL to the result.
#[async_trait]
pub trait MaskedEditBackend: Send + Sync {
    async fn edit_with_mask(
        &self,
        image: &[u8],
        mask: &[u8],
        prompt: &str,
    ) -> Result<String, UpstreamError>;
}

/// Edits a whole image from an instruction and returns the bytes inline.
#[async_trait]
pub trait GenerativeEditBackend: Send + Sync {
    async fn edit_without_mask(
        &self,
        image: &[u8],
        prompt: &str,
    ) -> Result<InlineImage, UpstreamError>;
}

/// Upscales an image and returns a URL to the result.
#[async_trait]
pub trait UpscaleBackend: Send + Sync {
    async fn upscale(&self, image: &[u8]) -> Result<String, UpstreamError>;
}

/// Produces the raw structured-output text for an instruction rewrite.
///
/// Implementations return the model's JSON text untouched; validation
/// against the response contract happens in the caller.
#[async_trait]
pub trait InstructionRewriteBackend: Send + Sync {
    async fn rewrite_instruction(
        &self,
        image: &[u8],
        mask: &[u8],
        instruction: &str,
    ) -> Result<String, UpstreamError>;
}

/// Computes a text embedding.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

/// Captions an image by URL with a description and category.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn describe(&self, image_url: &str) -> Result<ImageDescription, UpstreamError>;
}

/// Downloads source images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpstreamError>;
}

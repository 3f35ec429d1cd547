//! Image edit orchestration.
//!
//! [`EditOrchestrator`] picks the backend from whether a mask is present:
//! masked edits go to the inpainting backend and come back as a URL,
//! mask-free edits go to the generative backend and come back inline.
//! [`EditService`] wraps it with the request-level steps: download the
//! source image, rasterize the polygons, and optionally rewrite the prompt.

use std::io::Cursor;
use std::sync::Arc;

use image::ImageFormat;
use retouch_core::error::CoreError;
use retouch_core::mask::{build_mask, image_dimensions, Polygon};
use retouch_core::prompt::validate_instruction;
use retouch_upstream::backend::{
    GenerativeEditBackend, ImageFetcher, MaskedEditBackend, UpscaleBackend,
};
use retouch_upstream::UpstreamError;

use crate::error::PipelineError;
use crate::rewrite::PromptRewriter;

/// Backend name reported when inline image bytes do not decode.
const GENERATIVE_BACKEND: &str = "generative edit";

/// Outcome of an edit or upscale.
#[derive(Debug, Clone, PartialEq)]
pub enum EditResult {
    /// Hosted result returned by the backend.
    Url(String),
    /// Image bytes returned inline, re-encoded as PNG.
    Inline { bytes: Vec<u8>, mime_type: String },
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct EditOrchestrator {
    masked: Arc<dyn MaskedEditBackend>,
    generative: Arc<dyn GenerativeEditBackend>,
}

impl EditOrchestrator {
    pub fn new(
        masked: Arc<dyn MaskedEditBackend>,
        generative: Arc<dyn GenerativeEditBackend>,
    ) -> Self {
        Self { masked, generative }
    }

    /// Submit one edit. Never retries; backend failures propagate with
    /// their status intact.
    pub async fn edit(
        &self,
        image: &[u8],
        mask: Option<&[u8]>,
        instruction: &str,
    ) -> Result<EditResult, PipelineError> {
        let instruction = validate_instruction(instruction)?;

        match mask {
            Some(mask) => {
                let url = self.masked.edit_with_mask(image, mask, instruction).await?;
                Ok(EditResult::Url(url))
            }
            None => {
                let inline = self.generative.edit_without_mask(image, instruction).await?;
                let bytes = reencode_png(&inline.bytes)?;
                tracing::info!(
                    returned_mime = ?inline.mime_type,
                    bytes = bytes.len(),
                    "Mask-free edit completed",
                );
                Ok(EditResult::Inline {
                    bytes,
                    mime_type: "image/png".to_string(),
                })
            }
        }
    }
}

/// Decode backend output and re-encode it as PNG.
fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| {
        UpstreamError::invalid(GENERATIVE_BACKEND, format!("returned bytes are not an image: {e}"))
    })?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(png)
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Request-level edit flows used by the HTTP handlers.
pub struct EditService {
    orchestrator: EditOrchestrator,
    upscaler: Arc<dyn UpscaleBackend>,
    fetcher: Arc<dyn ImageFetcher>,
    rewriter: Option<PromptRewriter>,
}

impl EditService {
    pub fn new(
        orchestrator: EditOrchestrator,
        upscaler: Arc<dyn UpscaleBackend>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            orchestrator,
            upscaler,
            fetcher,
            rewriter: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: PromptRewriter) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Masked edit: polygons mark the regions to regenerate.
    ///
    /// With `rewrite` set, the prompt is first normalized by the rewriter
    /// using the same image and mask that go to the editor.
    pub async fn edit_with_polygons(
        &self,
        image_url: &str,
        polygons: &[Polygon],
        prompt: &str,
        rewrite: bool,
    ) -> Result<EditResult, PipelineError> {
        let prompt = validate_instruction(prompt)?;
        let image = self.fetch(image_url).await?;

        let dimensions = image_dimensions(&image)?;
        let mask = build_mask(dimensions, polygons)?;
        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            polygons = polygons.len(),
            editable = mask.editable_count(),
            "Built edit mask",
        );
        let mask_png = mask.to_png()?;

        let instruction = match (&self.rewriter, rewrite) {
            (Some(rewriter), true) => rewriter.rewrite(&image, &mask_png, prompt).await?,
            (None, true) => {
                tracing::warn!("Prompt rewrite requested but no rewriter is configured");
                prompt.to_string()
            }
            (_, false) => prompt.to_string(),
        };

        self.orchestrator
            .edit(&image, Some(&mask_png), &instruction)
            .await
    }

    /// Whole-image edit through the generative backend.
    pub async fn edit_without_mask(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> Result<EditResult, PipelineError> {
        let prompt = validate_instruction(prompt)?;
        let image = self.fetch(image_url).await?;
        self.orchestrator.edit(&image, None, prompt).await
    }

    pub async fn upscale(&self, image_url: &str) -> Result<EditResult, PipelineError> {
        let image = self.fetch(image_url).await?;
        let url = self.upscaler.upscale(&image).await?;
        Ok(EditResult::Url(url))
    }

    async fn fetch(&self, image_url: &str) -> Result<Vec<u8>, PipelineError> {
        if image_url.trim().is_empty() {
            return Err(CoreError::InvalidInput("image_url must not be empty".into()).into());
        }
        let image = self.fetcher.fetch(image_url).await?;
        tracing::debug!(image_url, bytes = image.len(), "Fetched source image");
        Ok(image)
    }
}

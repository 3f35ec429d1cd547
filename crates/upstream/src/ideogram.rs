//! Client for the Ideogram masked-edit and upscale endpoints.
//!
//! Both endpoints take a multipart upload and answer with
//! `{"data": [{"url": ...}, ...]}`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::backend::{MaskedEditBackend, UpscaleBackend};
use crate::config::IdeogramConfig;
use crate::error::UpstreamError;
use crate::http::{parse_json, sniff_mime};

const BACKEND: &str = "ideogram";

/// HTTP client for the Ideogram API.
pub struct IdeogramClient {
    client: reqwest::Client,
    config: IdeogramConfig,
}

/// Envelope returned by `/edit` and `/upscale`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    #[serde(default)]
    is_image_safe: Option<bool>,
    #[serde(default)]
    seed: Option<i64>,
}

impl IdeogramClient {
    /// Create a client reusing an existing [`reqwest::Client`]
    /// (shares the connection pool and timeout with other backends).
    pub fn with_client(client: reqwest::Client, config: IdeogramConfig) -> Self {
        Self { client, config }
    }

    /// Submit image + mask + prompt to `POST /edit`.
    ///
    /// Mask pixels that are black are regenerated; white pixels are kept.
    pub async fn edit(&self, image: &[u8], mask: &[u8], prompt: &str) -> Result<String, UpstreamError> {
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("model", self.config.model.clone())
            .text("magic_prompt_option", self.config.magic_prompt_option.clone())
            .text("style_type", self.config.style_type.clone())
            .part("image_file", image_part(image, "image")?)
            .part("mask", image_part(mask, "mask.png")?);

        let url = self.submit("edit", form).await?;
        tracing::info!(url = %url, "Ideogram edit completed");
        Ok(url)
    }

    /// Submit an image to `POST /upscale` with default upscale settings.
    pub async fn upscale_image(&self, image: &[u8]) -> Result<String, UpstreamError> {
        let form = Form::new()
            .text("image_request", "{}")
            .part("image_file", image_part(image, "image")?);

        let url = self.submit("upscale", form).await?;
        tracing::info!(url = %url, "Ideogram upscale completed");
        Ok(url)
    }

    // ---- private helpers ----

    async fn submit(&self, endpoint: &str, form: Form) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/')))
            .header("Api-Key", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?;

        let body: GenerateResponse = parse_json(BACKEND, response).await?;
        first_url(body)
    }
}

/// Pick the first generated image that carries a URL.
fn first_url(body: GenerateResponse) -> Result<String, UpstreamError> {
    let image = body
        .data
        .into_iter()
        .find(|image| image.url.is_some())
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "response contained no image URL"))?;

    if image.is_image_safe == Some(false) {
        tracing::warn!(seed = ?image.seed, "Ideogram flagged the generated image as unsafe");
    }

    image
        .url
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "response contained no image URL"))
}

fn image_part(bytes: &[u8], file_name: &'static str) -> Result<Part, UpstreamError> {
    Part::bytes(bytes.to_vec())
        .file_name(file_name)
        .mime_str(sniff_mime(bytes))
        .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))
}

#[async_trait]
impl MaskedEditBackend for IdeogramClient {
    async fn edit_with_mask(
        &self,
        image: &[u8],
        mask: &[u8],
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        self.edit(image, mask, prompt).await
    }
}

#[async_trait]
impl UpscaleBackend for IdeogramClient {
    async fn upscale(&self, image: &[u8]) -> Result<String, UpstreamError> {
        self.upscale_image(image).await
    }
}

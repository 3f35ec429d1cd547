//! Downloads source images by URL.

use async_trait::async_trait;

use crate::backend::ImageFetcher;
use crate::error::UpstreamError;
use crate::http::ensure_success;

const BACKEND: &str = "image host";

/// Largest source image accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 32 * 1024 * 1024;

/// Plain GET fetcher sharing the upstream client's timeout.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self, url: &str) -> UpstreamError {
        UpstreamError::invalid(
            BACKEND,
            format!("{url} is larger than {} bytes", self.max_bytes),
        )
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?;
        let mut response = ensure_success(BACKEND, response).await?;

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        // Content-Length may be absent or wrong, so the cap is enforced
        // while reading as well.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(UpstreamError::invalid(BACKEND, format!("{url} returned an empty body")));
        }
        tracing::debug!(url, bytes = bytes.len(), "Fetched image");
        Ok(bytes)
    }
}

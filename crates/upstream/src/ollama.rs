//! Text embeddings from a local Ollama host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::EmbeddingBackend;
use crate::config::OllamaConfig;
use crate::error::UpstreamError;
use crate::http::parse_json;

const BACKEND: &str = "ollama";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Calls `POST {host}/api/embeddings`.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaEmbedder {
    pub fn with_client(client: reqwest::Client, config: OllamaConfig) -> Self {
        Self { client, config }
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.config.host.trim_end_matches('/')))
            .json(&EmbeddingRequest {
                model: &self.config.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?;

        let body: EmbeddingResponse = parse_json(BACKEND, response).await?;
        if body.embedding.is_empty() {
            return Err(UpstreamError::invalid(BACKEND, "embedding is empty"));
        }
        tracing::debug!(model = %self.config.model, dimension = body.embedding.len(), "Computed embedding");
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        self.embed_text(text).await
    }
}

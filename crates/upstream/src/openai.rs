//! Image captioning through an OpenAI-compatible chat-completions endpoint.
//!
//! The model is constrained with a `json_schema` response format so the
//! reply deserializes straight into an [`ImageDescription`].

use async_trait::async_trait;
use retouch_core::catalog::{caption_prompt, display_url, ImageDescription};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::CaptionBackend;
use crate::config::OpenAiConfig;
use crate::error::UpstreamError;
use crate::http::parse_json;

const BACKEND: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

pub struct OpenAiCaptioner {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiCaptioner {
    pub fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    /// Caption the image at `image_url`. The display-size variant of the
    /// URL is sent so the model never downloads the full original.
    pub async fn caption(&self, image_url: &str) -> Result<ImageDescription, UpstreamError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": caption_prompt() },
                    { "type": "image_url", "image_url": { "url": display_url(image_url) } },
                ],
            })],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "image_description",
                    "strict": true,
                    "schema": ImageDescription::json_schema(),
                },
            }),
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?;

        let body: ChatResponse = parse_json(BACKEND, response).await?;
        parse_description(body)
    }
}

fn parse_description(body: ChatResponse) -> Result<ImageDescription, UpstreamError> {
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "response contained no choices"))?;

    if let Some(refusal) = message.refusal {
        return Err(UpstreamError::invalid(BACKEND, format!("model refused: {refusal}")));
    }

    let content = message
        .content
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "message has no content"))?;

    serde_json::from_str::<ImageDescription>(&content)
        .map_err(|e| UpstreamError::invalid(BACKEND, format!("caption does not match schema: {e}")))?
        .validate()
        .map_err(|e| UpstreamError::invalid(BACKEND, e.to_string()))
}

#[async_trait]
impl CaptionBackend for OpenAiCaptioner {
    async fn describe(&self, image_url: &str) -> Result<ImageDescription, UpstreamError> {
        self.caption(image_url).await
    }
}

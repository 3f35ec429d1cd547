//! Client for the Gemini `generateContent` endpoint.
//!
//! Used two ways:
//! - mask-free image edits, where the image model answers with an
//!   `inlineData` part carrying base64 image bytes;
//! - instruction rewriting, where the text model is constrained to a JSON
//!   response schema and answers with a text part.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use retouch_core::prompt::{RewrittenInstruction, REWRITE_SYSTEM_INSTRUCTION};
use serde::{Deserialize, Serialize};

use crate::backend::{GenerativeEditBackend, InlineImage, InstructionRewriteBackend};
use crate::config::GeminiConfig;
use crate::error::UpstreamError;
use crate::http::{parse_json, sniff_mime};

const BACKEND: &str = "gemini";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl RequestPart {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn image(bytes: &[u8]) -> Self {
        Self::Inline {
            inline_data: InlineData {
                mime_type: sniff_mime(bytes).to_string(),
                data: BASE64.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlineData>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    /// Edit `image` according to `prompt` and return the generated image.
    pub async fn generate_image(&self, image: &[u8], prompt: &str) -> Result<InlineImage, UpstreamError> {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart::text(prompt), RequestPart::image(image)],
            }],
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["TEXT", "IMAGE"]),
                ..Default::default()
            },
        };

        let response = self.generate(&self.config.image_model, &request).await?;
        let inline = first_inline_image(response)?;
        tracing::debug!(
            bytes = inline.bytes.len(),
            mime_type = ?inline.mime_type,
            "Gemini returned inline image",
        );
        Ok(inline)
    }

    /// Ask the text model for a normalized English edit instruction.
    ///
    /// Returns the raw JSON text of the structured response.
    pub async fn rewrite(&self, image: &[u8], mask: &[u8], instruction: &str) -> Result<String, UpstreamError> {
        let request = GenerateContentRequest {
            system_instruction: Some(Content {
                role: None,
                parts: vec![RequestPart::text(REWRITE_SYSTEM_INSTRUCTION)],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    RequestPart::text("Original image:"),
                    RequestPart::image(image),
                    RequestPart::text("Mask (black = region to edit):"),
                    RequestPart::image(mask),
                    RequestPart::text(format!("Request: {instruction}")),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(RewrittenInstruction::response_schema()),
                ..Default::default()
            },
        };

        let response = self.generate(&self.config.text_model, &request).await?;
        first_text(response)
    }

    // ---- private helpers ----

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, UpstreamError> {
        let response = self
            .client
            .post(format!(
                "{}/models/{model}:generateContent",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(BACKEND, e))?;

        parse_json(BACKEND, response).await
    }
}

/// Decode the first `inlineData` part of the first candidate.
fn first_inline_image(response: GenerateContentResponse) -> Result<InlineImage, UpstreamError> {
    let candidate = first_candidate(response)?;
    let inline = candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "response contained no inline image"))?;

    let bytes = BASE64
        .decode(inline.data.as_bytes())
        .map_err(|e| UpstreamError::invalid(BACKEND, format!("inline image is not base64: {e}")))?;

    Ok(InlineImage {
        bytes,
        mime_type: Some(inline.mime_type).filter(|m| !m.is_empty()),
    })
}

/// Concatenate the text parts of the first candidate.
fn first_text(response: GenerateContentResponse) -> Result<String, UpstreamError> {
    let candidate = first_candidate(response)?;
    let text: String = candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(UpstreamError::invalid(BACKEND, "response contained no text"));
    }
    Ok(text)
}

fn first_candidate(response: GenerateContentResponse) -> Result<Candidate, UpstreamError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::invalid(BACKEND, "response contained no candidates"))?;

    if candidate.content.is_none() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(UpstreamError::invalid(
            BACKEND,
            format!("candidate has no content (finish reason: {reason})"),
        ));
    }
    Ok(candidate)
}

#[async_trait]
impl GenerativeEditBackend for GeminiClient {
    async fn edit_without_mask(&self, image: &[u8], prompt: &str) -> Result<InlineImage, UpstreamError> {
        self.generate_image(image, prompt).await
    }
}

#[async_trait]
impl InstructionRewriteBackend for GeminiClient {
    async fn rewrite_instruction(
        &self,
        image: &[u8],
        mask: &[u8],
        instruction: &str,
    ) -> Result<String, UpstreamError> {
        self.rewrite(image, mask, instruction).await
    }
}

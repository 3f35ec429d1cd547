//! Instruction rewriting contract.
//!
//! The rewriter asks a multimodal model to turn a free-form (possibly
//! non-English) edit request into a single English instruction the image
//! editor understands. The model must answer with exactly one JSON field,
//! which is validated here after deserialization.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// System instruction sent with every rewrite request.
pub const REWRITE_SYSTEM_INSTRUCTION: &str = "\
You rewrite image-editing requests for an inpainting model. \
You receive the original image, a mask image and the user's request. \
In the mask, black pixels mark the region that will be regenerated and \
white pixels are kept unchanged. \
Write one instruction that describes what the masked region should contain \
after the edit. Refer to the region with explicit location and size language \
(for example \"the small area in the upper left corner\"). \
Preserve the style, lighting and perspective of the original image. \
The request may be written in any language; always answer in English only. \
Respond with JSON containing a single field named \"instruction\".";

/// Expected structured response from the rewrite model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewrittenInstruction {
    pub instruction: String,
}

impl RewrittenInstruction {
    /// Parse the model's JSON text and return the trimmed instruction.
    pub fn parse(text: &str) -> Result<String, CoreError> {
        let parsed: Self = serde_json::from_str(text.trim()).map_err(|e| {
            CoreError::InvalidInput(format!("Rewrite response does not match schema: {e}"))
        })?;
        let instruction = parsed.instruction.trim();
        if instruction.is_empty() {
            return Err(CoreError::InvalidInput(
                "Rewrite response contained an empty instruction".into(),
            ));
        }
        Ok(instruction.to_string())
    }

    /// Response schema in the OpenAPI subset the model API accepts.
    pub fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "instruction": { "type": "STRING" },
            },
            "required": ["instruction"],
        })
    }
}

/// Reject blank edit instructions before any backend is called.
pub fn validate_instruction(instruction: &str) -> Result<&str, CoreError> {
    let trimmed = instruction.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("Prompt must not be empty".into()));
    }
    Ok(trimmed)
}

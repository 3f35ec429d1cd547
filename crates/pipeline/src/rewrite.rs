//! Optional stage turning a free-form request into an English instruction.

use std::sync::Arc;

use retouch_core::prompt::{validate_instruction, RewrittenInstruction};
use retouch_upstream::backend::InstructionRewriteBackend;
use retouch_upstream::UpstreamError;

use crate::error::PipelineError;

/// Backend name reported when the rewrite response breaks its contract.
const BACKEND: &str = "instruction rewrite";

pub struct PromptRewriter {
    backend: Arc<dyn InstructionRewriteBackend>,
}

impl PromptRewriter {
    pub fn new(backend: Arc<dyn InstructionRewriteBackend>) -> Self {
        Self { backend }
    }

    /// Rewrite `instruction` given the source image and its edit mask.
    ///
    /// A response that does not deserialize into [`RewrittenInstruction`],
    /// or carries a blank instruction, is an upstream failure.
    pub async fn rewrite(
        &self,
        image: &[u8],
        mask: &[u8],
        instruction: &str,
    ) -> Result<String, PipelineError> {
        let instruction = validate_instruction(instruction)?;
        let text = self
            .backend
            .rewrite_instruction(image, mask, instruction)
            .await?;
        let rewritten = RewrittenInstruction::parse(&text)
            .map_err(|e| UpstreamError::invalid(BACKEND, e.to_string()))?;

        tracing::info!(original = %instruction, rewritten = %rewritten, "Rewrote edit instruction");
        Ok(rewritten)
    }
}

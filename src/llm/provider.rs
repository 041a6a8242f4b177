//! Assessment model contract.
//!
//! The pipeline hands the model a sequence of prompt parts (text segments
//! plus inline images) and gets back free-form text. No structured schema
//! is enforced here; grammar compliance is the decision parser's problem.

use async_trait::async_trait;

use crate::error::LlmError;

/// One segment of an assessment prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    /// Inline image evidence, base64-encoded.
    Image {
        /// MIME type, e.g. `image/png`.
        media_type: String,
        data: String,
    },
}

impl PromptPart {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// A language model that assesses claim submissions.
#[async_trait]
pub trait AssessmentClient: Send + Sync {
    /// Model identifier for logging.
    fn model_name(&self) -> &str;

    /// One synchronous assessment call; no retry on failure.
    async fn assess(&self, system_prompt: &str, parts: &[PromptPart])
    -> Result<String, LlmError>;
}

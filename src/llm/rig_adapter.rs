//! Bridge between rig's `CompletionModel` and the `AssessmentClient` trait.

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, ImageMediaType, Message, UserContent};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{AssessmentClient, PromptPart};
use crate::llm::LlmConfig;

/// Adapts any rig `CompletionModel` to the assessment contract.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    temperature: f64,
    max_tokens: u64,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, config: &LlmConfig) -> Self {
        Self {
            model,
            model_name: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Map a MIME string to rig's media type; unknown types are sent as PNG,
/// which matches how the upstream data URLs were labeled.
fn media_type_for(mime: &str) -> ImageMediaType {
    match mime {
        "image/jpeg" => ImageMediaType::JPEG,
        "image/gif" => ImageMediaType::GIF,
        "image/webp" => ImageMediaType::WEBP,
        _ => ImageMediaType::PNG,
    }
}

fn to_user_content(part: &PromptPart) -> UserContent {
    match part {
        PromptPart::Text(text) => UserContent::text(text.clone()),
        PromptPart::Image { media_type, data } => UserContent::image_base64(
            data.clone(),
            Some(media_type_for(media_type)),
            None,
        ),
    }
}

#[async_trait]
impl<M: CompletionModel> AssessmentClient for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn assess(
        &self,
        system_prompt: &str,
        parts: &[PromptPart],
    ) -> Result<String, LlmError> {
        let content = OneOrMany::many(parts.iter().map(to_user_content).collect::<Vec<_>>())
            .map_err(|_| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: "empty prompt".into(),
            })?;

        let message = Message::User { content };

        let response = self
            .model
            .completion_request(message)
            .preamble(system_prompt.to_string())
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        let text: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "response contained no text content".into(),
            });
        }

        debug!(model = %self.model_name, chars = text.len(), "Assessment response received");
        Ok(text)
    }
}

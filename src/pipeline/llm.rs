//! Model interaction: the [`Generator`] seam and its provider-backed default.
//!
//! Everything above this module talks to a `dyn Generator`, never to a
//! concrete API. That keeps the orchestration testable with a scripted
//! generator and lets library users plug in their own transport.
//!
//! There is no retry here. A failed call is reported once, verbatim, and the
//! caller decides what to do next.

use crate::config::AnalysisConfig;
use crate::error::{LensError, TransportError};
use crate::pipeline::encode::GenerativePart;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// One submission: an instruction plus an optional attached file.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    instruction_text: String,
    part: Option<GenerativePart>,
}

impl PromptRequest {
    pub fn new(instruction_text: impl Into<String>, part: Option<GenerativePart>) -> Self {
        Self {
            instruction_text: instruction_text.into(),
            part,
        }
    }

    /// Text-only request.
    pub fn text(instruction_text: impl Into<String>) -> Self {
        Self::new(instruction_text, None)
    }

    /// Request with an attached file.
    pub fn with_part(instruction_text: impl Into<String>, part: GenerativePart) -> Self {
        Self::new(instruction_text, Some(part))
    }

    pub fn instruction_text(&self) -> &str {
        &self.instruction_text
    }

    pub fn part(&self) -> Option<&GenerativePart> {
        self.part.as_ref()
    }

    /// Reject requests that cannot produce a meaningful answer.
    pub fn validate(&self) -> Result<(), LensError> {
        if self.instruction_text.trim().is_empty() {
            return Err(LensError::EmptyPrompt);
        }
        Ok(())
    }
}

/// Text returned by the model plus token accounting when available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Generation {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// The external model API.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Send one request and return the model's text.
    async fn generate(&self, request: &PromptRequest) -> Result<Generation, TransportError>;

    /// Short label for logs.
    fn label(&self) -> String {
        "generator".to_string()
    }
}

/// [`Generator`] backed by an `edgequake-llm` provider.
///
/// ## Message Layout
///
/// 1. **System message**: only when a system prompt is configured
/// 2. **User message**: the instruction text with the part attached inline
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: usize,
    api_timeout_secs: u64,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn build_messages(&self, request: &PromptRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        let images: Vec<ImageData> = request.part().cloned().map(Into::into).into_iter().collect();
        messages.push(ChatMessage::user_with_images(
            request.instruction_text(),
            images,
        ));
        messages
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: &PromptRequest) -> Result<Generation, TransportError> {
        let start = Instant::now();
        let messages = self.build_messages(request);
        let options = self.build_options();

        let call = self.provider.chat(&messages, Some(&options));
        let response = match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let message = format!("{e}");
                warn!("{}: call failed: {}", self.label, message);
                return Err(TransportError::Api { message });
            }
            Err(_) => {
                warn!("{}: call timed out after {}s", self.label, self.api_timeout_secs);
                return Err(TransportError::Timeout {
                    secs: self.api_timeout_secs,
                });
            }
        };

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_bytes;

    #[test]
    fn empty_prompt_is_rejected() {
        assert!(matches!(
            PromptRequest::text("   \n").validate(),
            Err(LensError::EmptyPrompt)
        ));
        assert!(PromptRequest::text("hi").validate().is_ok());
    }

    #[test]
    fn request_keeps_part() {
        let part = encode_bytes(b"%PDF", "application/pdf");
        let req = PromptRequest::with_part("Summarise", part.clone());
        assert_eq!(req.instruction_text(), "Summarise");
        assert_eq!(req.part(), Some(&part));
        assert!(PromptRequest::text("x").part().is_none());
    }

    #[test]
    fn generation_from_text() {
        let g = Generation::from_text("ok");
        assert_eq!(g.text, "ok");
        assert_eq!(g.input_tokens, 0);
    }
}

//! The `LlmBackend` seam.
//!
//! An adaptation is always one system prompt plus one piece of text, so the
//! request carries exactly that rather than a conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure reaching or using a text model.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Backend cannot be reached or constructed
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a non-success status
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Backend asked us to slow down
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Output withheld by the backend's content filter
    #[error("Completion withheld by content filter")]
    Filtered,

    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Backend-specific failure
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Model identifier, used in logs.
    fn id(&self) -> &str;

    /// Cheap reachability probe.
    async fn is_available(&self) -> bool;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// One adaptation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Profile instructions
    pub system_prompt: String,
    /// Text to adapt, already wrapped by the prompt assembler
    pub user_prompt: String,
    pub max_tokens: Option<u32>,
    /// Sampling temperature, clamped to 0.0..=2.0
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    /// Rough prompt size, four characters per token.
    pub fn estimated_tokens(&self) -> u32 {
        ((self.system_prompt.len() + self.user_prompt.len()) / 4) as u32
    }
}

/// Completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Cut off at `max_tokens`; the adapted text is incomplete
    Length,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt + self.completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("You adapt text", "Simplify this")
            .with_max_tokens(512)
            .with_temperature(3.5);

        assert_eq!(request.system_prompt, "You adapt text");
        assert_eq!(request.user_prompt, "Simplify this");
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(request.estimated_tokens(), 6);
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            prompt: 40,
            completion: 2,
        };
        assert_eq!(usage.total(), 42);
    }
}

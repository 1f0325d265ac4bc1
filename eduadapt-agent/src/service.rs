//! AdaptationService - the LLM-backed adaptation client.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, FinishReason, LlmBackend};
use crate::client::{AdaptTextRequest, AdaptTextResponse, AdaptationClient, AdaptationError};
use crate::prompt::PromptAssembler;
use crate::types::{AdaptationOptions, Profile};

/// Configuration for the AdaptationService.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

/// Adapts text by prompting the first available backend.
pub struct AdaptationService {
    config: ServiceConfig,
    backends: Vec<Arc<dyn LlmBackend>>,
}

impl AdaptationService {
    /// Create a new service with the given backends, in preference order.
    pub fn new(backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        Self {
            config: ServiceConfig::default(),
            backends,
        }
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether any backend is reachable (the popup's availability probe).
    pub async fn check_availability(&self) -> bool {
        self.select_backend().await.is_ok()
    }

    /// Answer a wire-level `adaptText` request.
    pub async fn handle(&self, request: AdaptTextRequest) -> AdaptTextResponse {
        let options = request.options.unwrap_or_default();
        self.adapt(&request.text, request.profile, &options).await.into()
    }

    async fn select_backend(&self) -> Result<Arc<dyn LlmBackend>, AdaptationError> {
        for backend in &self.backends {
            if backend.is_available().await {
                return Ok(Arc::clone(backend));
            }
        }
        Err(AdaptationError::NoBackendAvailable)
    }
}

#[async_trait]
impl AdaptationClient for AdaptationService {
    async fn adapt(
        &self,
        text: &str,
        profile: Profile,
        options: &AdaptationOptions,
    ) -> Result<String, AdaptationError> {
        if text.trim().is_empty() {
            return Err(AdaptationError::EmptyInput);
        }

        let backend = self.select_backend().await?;

        let request = CompletionRequest::new(
            PromptAssembler::build_system_prompt(profile, options),
            PromptAssembler::build_user_prompt(text),
        )
        .with_max_tokens(self.config.max_tokens)
        .with_temperature(self.config.temperature);

        debug!(
            backend = %backend.id(),
            profile = %profile,
            chars = text.len(),
            "Requesting adaptation"
        );

        let completion = backend.complete(request).await?;

        if completion.finish_reason == FinishReason::Length {
            warn!(backend = %backend.id(), "Adaptation truncated at max tokens");
        }

        Ok(completion.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::types::GradeLevel;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_adapt_uses_first_available_backend() {
        let offline = Arc::new(MockBackend::new("offline").with_available(false));
        let online = Arc::new(MockBackend::new("online").with_response("  - Short point.\n"));
        let service = AdaptationService::new(vec![offline.clone(), online.clone()]);

        let text = assert_ok!(
            service
                .adapt("A very long paragraph.", Profile::Adhd, &AdaptationOptions::default())
                .await
        );

        assert_eq!(text, "- Short point.");
        assert_eq!(offline.call_count(), 0);
        assert_eq!(online.call_count(), 1);

        let request = online.last_request().unwrap();
        assert!(request.system_prompt.contains("ADHD"));
    }

    #[tokio::test]
    async fn test_no_backend_available() {
        let service =
            AdaptationService::new(vec![Arc::new(MockBackend::default().with_available(false))]);

        assert!(!service.check_availability().await);
        let err = assert_err!(
            service
                .adapt("Some text", Profile::Autism, &AdaptationOptions::default())
                .await
        );
        assert!(matches!(err, AdaptationError::NoBackendAvailable));
    }

    #[tokio::test]
    async fn test_handle_wire_request() {
        let backend = Arc::new(MockBackend::default().with_failure("boom"));
        let service = AdaptationService::new(vec![backend]);

        let response = service
            .handle(AdaptTextRequest {
                text: "Cells divide.".to_string(),
                profile: Profile::Dyslexia,
                options: Some(AdaptationOptions::default().with_grade_level(GradeLevel::Lower)),
            })
            .await;

        assert!(!response.success);
        assert!(response.user_message.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let service = AdaptationService::new(vec![Arc::new(MockBackend::default())]);
        let result = service
            .adapt("   ", Profile::Default, &AdaptationOptions::default())
            .await;
        assert!(matches!(result, Err(AdaptationError::EmptyInput)));
    }
}

//! In-process backend for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::traits::*;

/// Canned backend: fixed reply or fixed failure, switchable availability,
/// and a record of the last prompt it saw.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    reply: String,
    failure: Option<String>,
    calls: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            reply: "Mock response".to_string(),
            failure: None,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.reply = content.into();
        self
    }

    /// Fail every completion with `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable(format!("{} is switched off", self.model_id)));
        }

        let prompt = request.estimated_tokens();
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        if let Some(message) = &self.failure {
            return Err(LlmError::Other(message.clone()));
        }

        Ok(CompletionResponse {
            content: self.reply.clone(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage {
                prompt,
                completion: (self.reply.len() / 4) as u32,
            },
        })
    }
}

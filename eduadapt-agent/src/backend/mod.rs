//! Text model backends.
//!
//! - [`OpenAiBackend`]: any `/chat/completions` server (Ollama by default)
//! - [`MockBackend`]: canned replies for tests

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use traits::{CompletionRequest, CompletionResponse, FinishReason, LlmBackend, LlmError, TokenUsage};

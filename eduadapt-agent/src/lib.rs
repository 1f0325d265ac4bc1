//! EduAdapt Agent - text adaptation client
//!
//! Provides the request/response side of page adaptation:
//! - Trait-based LLM backends (OpenAI-compatible, mock)
//! - Profile-aware prompt assembly
//! - The `adaptText` wire contract and the `AdaptationClient` trait
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         AdaptationService               │
//! │   (implements AdaptationClient)         │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ LlmBackend  │       │  Prompt     │
//! │ (OpenAI/    │       │  Assembler  │
//! │  Mock)      │       │             │
//! └─────────────┘       └─────────────┘
//! ```

pub mod backend;
pub mod client;
pub mod prompt;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use client::{AdaptTextRequest, AdaptTextResponse, AdaptationClient, AdaptationError};
pub use prompt::PromptAssembler;
pub use service::{AdaptationService, ServiceConfig};
pub use types::*;

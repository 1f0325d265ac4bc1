//! The adaptation client contract.
//!
//! A single logical request/response call. Retry, batching and ordering are
//! the caller's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::traits::LlmError;
use crate::types::{AdaptationOptions, Profile};

/// Error returned by an adaptation call.
#[derive(Debug, thiserror::Error)]
pub enum AdaptationError {
    /// The service answered but declined to adapt the text
    #[error("Adaptation rejected: {}", user_message.as_deref().unwrap_or("no reason given"))]
    Rejected { user_message: Option<String> },

    /// The model backend failed
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    /// No backend answered the availability probe
    #[error("No text model available")]
    NoBackendAvailable,

    /// Nothing to adapt
    #[error("Empty input text")]
    EmptyInput,
}

impl AdaptationError {
    /// Message suitable for a user-facing status slot, if the service supplied one.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            AdaptationError::Rejected { user_message } => user_message.as_deref(),
            AdaptationError::NoBackendAvailable => Some("The text model is not available right now."),
            AdaptationError::Backend(LlmError::RateLimited { .. }) => {
                Some("The text model is busy. Please try again in a moment.")
            }
            _ => None,
        }
    }
}

/// Client for the external text-adaptation service.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait AdaptationClient: Send + Sync {
    /// Adapt one piece of text for a profile.
    async fn adapt(
        &self,
        text: &str,
        profile: Profile,
        options: &AdaptationOptions,
    ) -> Result<String, AdaptationError>;
}

/// Outbound `adaptText` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptTextRequest {
    pub text: String,
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AdaptationOptions>,
}

/// `adaptText` response as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptTextResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl AdaptTextResponse {
    /// Successful response.
    pub fn adapted(text: impl Into<String>) -> Self {
        Self {
            success: true,
            adapted_text: Some(text.into()),
            user_message: None,
        }
    }

    /// Failed response with an optional user-facing message.
    pub fn failed(user_message: Option<String>) -> Self {
        Self {
            success: false,
            adapted_text: None,
            user_message,
        }
    }

    /// Convert into the typed result used by the scheduler.
    ///
    /// `success: false` and a successful response without text are both
    /// rejections.
    pub fn into_result(self) -> Result<String, AdaptationError> {
        match (self.success, self.adapted_text) {
            (true, Some(text)) => Ok(text),
            (_, _) => Err(AdaptationError::Rejected {
                user_message: self.user_message,
            }),
        }
    }
}

impl From<Result<String, AdaptationError>> for AdaptTextResponse {
    fn from(result: Result<String, AdaptationError>) -> Self {
        match result {
            Ok(text) => AdaptTextResponse::adapted(text),
            Err(err) => AdaptTextResponse::failed(
                err.user_message()
                    .map(str::to_string)
                    .or_else(|| Some(err.to_string())),
            ),
        }
    }
}

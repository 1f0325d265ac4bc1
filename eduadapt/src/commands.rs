//! Inbound command dispatch.
//!
//! JSON messages from a settings surface, tagged by `action`:
//!
//! ```json
//! {"action": "adaptPage", "profile": "adhd", "options": {"gradeLevel": "lower"}}
//! {"action": "resetPage"}
//! {"action": "checkAvailability"}
//! ```
//!
//! `adaptPage` replies once the whole run has finished, so a long page keeps
//! the caller waiting. Dyslexia runs reply after attaching support; their
//! background prefetch continues afterwards.

use async_trait::async_trait;
use eduadapt_agent::AdaptationService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::controller::PageController;
use crate::document::HostDocument;
use crate::types::{AdaptationOptions, Profile};

const SELECT_PROFILE: &str = "Please select a learning profile first.";

/// Inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    AdaptPage {
        /// Raw selection; `none` means nothing was picked
        profile: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<AdaptationOptions>,
    },
    ResetPage,
    CheckAvailability,
}

/// Reply to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Status {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Availability {
        available: bool,
    },
}

impl CommandResponse {
    pub fn ok() -> Self {
        CommandResponse::Status {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        CommandResponse::Status {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Whether the adaptation service can take requests.
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    async fn is_available(&self) -> bool;
}

#[async_trait]
impl AvailabilityCheck for AdaptationService {
    async fn is_available(&self) -> bool {
        self.check_availability().await
    }
}

/// Routes commands to a page controller.
pub struct CommandDispatcher<H: HostDocument> {
    controller: Arc<PageController<H>>,
    availability: Arc<dyn AvailabilityCheck>,
}

impl<H: HostDocument> CommandDispatcher<H> {
    pub fn new(controller: Arc<PageController<H>>, availability: Arc<dyn AvailabilityCheck>) -> Self {
        Self {
            controller,
            availability,
        }
    }

    /// Parse and handle one JSON message.
    pub async fn dispatch_json(&self, message: &str) -> CommandResponse {
        match serde_json::from_str::<Command>(message) {
            Ok(command) => self.dispatch(command).await,
            Err(err) => {
                warn!(error = %err, "Unrecognized command");
                CommandResponse::failed(format!("Unrecognized command: {}", err))
            }
        }
    }

    /// Handle one command.
    pub async fn dispatch(&self, command: Command) -> CommandResponse {
        debug!(command = ?command, "Dispatching command");
        match command {
            Command::AdaptPage { profile, options } => {
                let Some(profile) = Profile::from_selection(&profile) else {
                    return CommandResponse::failed(SELECT_PROFILE);
                };
                match self.controller.adapt_page(profile, options).await {
                    Ok(_) => CommandResponse::ok(),
                    Err(err) => CommandResponse::failed(err.to_string()),
                }
            }
            Command::ResetPage => match self.controller.reset() {
                Ok(()) => CommandResponse::ok(),
                Err(err) => CommandResponse::failed(err.to_string()),
            },
            Command::CheckAvailability => CommandResponse::Availability {
                available: self.availability.is_available().await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::notify::RecordingSink;
    use crate::types::GradeLevel;
    use eduadapt_agent::{AdaptationClient, AdaptationError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AdaptationClient for CountingClient {
        async fn adapt(
            &self,
            _text: &str,
            _profile: Profile,
            _options: &AdaptationOptions,
        ) -> Result<String, AdaptationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Plain words.".to_string())
        }
    }

    struct Offline;

    #[async_trait]
    impl AvailabilityCheck for Offline {
        async fn is_available(&self) -> bool {
            false
        }
    }

    fn dispatcher() -> (CommandDispatcher<MemoryDocument>, Arc<CountingClient>) {
        let doc = MemoryDocument::from_value(json!({
            "root": { "tag": "body", "children": [
                { "tag": "p", "children": ["Rivers carry water from the hills down to the sea over many long years."] }
            ]}
        }))
        .unwrap();
        let client = Arc::new(CountingClient::default());
        let controller = Arc::new(PageController::new(
            Arc::new(doc),
            client.clone(),
            Arc::new(RecordingSink::new()),
        ));
        (CommandDispatcher::new(controller, Arc::new(Offline)), client)
    }

    #[test]
    fn test_command_wire_format() {
        let command: Command = serde_json::from_value(json!({
            "action": "adaptPage",
            "profile": "autism",
            "options": { "gradeLevel": "upper" }
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::AdaptPage {
                profile: "autism".to_string(),
                options: Some(AdaptationOptions::default().with_grade_level(GradeLevel::Upper)),
            }
        );

        let reset: Command = serde_json::from_str(r#"{"action":"resetPage"}"#).unwrap();
        assert_eq!(reset, Command::ResetPage);

        assert_eq!(
            serde_json::to_value(CommandResponse::ok()).unwrap(),
            json!({ "success": true })
        );
        assert_eq!(
            serde_json::to_value(CommandResponse::Availability { available: true }).unwrap(),
            json!({ "available": true })
        );
    }

    #[tokio::test]
    async fn test_none_profile_rejected_without_calls() {
        let (dispatcher, client) = dispatcher();
        let response = dispatcher
            .dispatch_json(r#"{"action":"adaptPage","profile":"none"}"#)
            .await;
        assert_eq!(response, CommandResponse::failed(SELECT_PROFILE));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_adapt_reset_and_availability() {
        let (dispatcher, client) = dispatcher();
        let adapted = dispatcher
            .dispatch(Command::AdaptPage {
                profile: "default".to_string(),
                options: None,
            })
            .await;
        assert_eq!(adapted, CommandResponse::ok());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        assert_eq!(dispatcher.dispatch(Command::ResetPage).await, CommandResponse::ok());
        assert_eq!(
            dispatcher.dispatch(Command::CheckAvailability).await,
            CommandResponse::Availability { available: false }
        );
    }

    #[tokio::test]
    async fn test_adapt_replies_after_page_is_rendered() {
        let doc = Arc::new(
            MemoryDocument::from_value(json!({
                "root": { "tag": "body", "children": [
                    { "tag": "p", "id": "river", "children": ["Rivers carry water from the hills down to the sea over many long years."] }
                ]}
            }))
            .unwrap(),
        );
        let controller = Arc::new(PageController::new(
            doc.clone(),
            Arc::new(CountingClient::default()),
            Arc::new(RecordingSink::new()),
        ));
        let dispatcher = CommandDispatcher::new(controller, Arc::new(Offline));

        let response = dispatcher
            .dispatch_json(r#"{"action":"adaptPage","profile":"default"}"#)
            .await;

        assert_eq!(response, CommandResponse::ok());
        let rendered = doc.rendered(doc.find_by_id("river").unwrap());
        assert_eq!(rendered.as_deref(), Some("<p>Plain words.</p>"));
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let (dispatcher, _client) = dispatcher();
        let response = dispatcher.dispatch_json(r#"{"action":"explode"}"#).await;
        assert!(matches!(response, CommandResponse::Status { success: false, .. }));
    }
}

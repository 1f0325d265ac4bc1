//! EduAdapt - accessibility page adaptation
//!
//! Rewrites a document's main content for a reader's learning profile:
//!
//! - **Extraction**: finds the substantive text blocks of the main content
//! - **Scheduling**: per-profile ordering, batching and bounded concurrency
//! - **Formatting**: turns markdown-ish model output into safe structured markup
//! - **Controller**: snapshot, restore, loading state and notifications
//!
//! The document itself is reached through the [`document::HostDocument`] seam;
//! [`document::MemoryDocument`] is the in-process implementation.

pub mod commands;
pub mod config;
pub mod controller;
pub mod document;
pub mod extract;
pub mod format;
pub mod notify;
pub mod scheduler;
pub mod settings;
pub mod types;

pub use commands::{Command, CommandDispatcher, CommandResponse};
pub use config::{Args, EduAdaptConfig};
pub use controller::PageController;
pub use document::{HostDocument, MemoryDocument};
pub use extract::BlockExtractor;
pub use notify::{NotificationSink, RecordingSink, TracingSink};
pub use settings::{auto_adapt_on_load, FileSettingsStore, SettingsStore, UserSettings};
pub use types::*;

//! Core types for page adaptation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{HostError, NodeId};

pub use eduadapt_agent::types::{
    AdaptationOptions, AdhdSummaryLength, DyslexiaLevel, GradeLevel, ParseOptionError, Profile,
};

/// Structural kind of an extracted block, from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    /// `h1`..`h6`, carrying the level
    Heading(u8),
    ListItem,
    Container,
}

impl BlockKind {
    /// Map a lowercase tag name to a block kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "p" => Some(BlockKind::Paragraph),
            "li" => Some(BlockKind::ListItem),
            "div" => Some(BlockKind::Container),
            _ => tag
                .strip_prefix('h')
                .and_then(|level| level.parse::<u8>().ok())
                .filter(|level| (1..=6).contains(level))
                .map(BlockKind::Heading),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, BlockKind::Heading(_))
    }
}

/// A unit of original page text selected for adaptation.
///
/// Blocks belong to a single run and are never reused across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position in the extracted sequence (document order)
    pub index: usize,
    /// Handle to the host element
    pub locator: NodeId,
    /// Trimmed rendered text at extraction time
    pub original_text: String,
    pub kind: BlockKind,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Extraction found no qualifying blocks; the page was not touched
    NothingToAdapt,
    /// Batch profiles: blocks rewritten in place
    Adapted { succeeded: usize, total: usize },
    /// Dyslexia: on-demand support attached to each block
    SupportAttached { jobs: usize },
}

/// Summary of one `adapt_page` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: Profile,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Unexpected failure of a whole run.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The host document refused an operation the run depends on
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant broken
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persisted settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

//! Persisted user settings and auto-adapt on page load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::PageController;
use crate::document::HostDocument;
use crate::types::{
    AdaptationOptions, AdhdSummaryLength, ControllerError, DyslexiaLevel, GradeLevel, Profile,
    RunReport, SettingsError,
};

/// Settings saved by the user between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    /// Adapt automatically once the page has settled
    pub auto_adapt: bool,
    /// Selected profile; `none` when nothing is picked
    pub profile: String,
    pub dyslexia_level: DyslexiaLevel,
    pub adhd_summary_length: AdhdSummaryLength,
    pub grade_level: GradeLevel,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            auto_adapt: false,
            profile: "none".to_string(),
            dyslexia_level: DyslexiaLevel::default(),
            adhd_summary_length: AdhdSummaryLength::default(),
            grade_level: GradeLevel::default(),
        }
    }
}

impl UserSettings {
    /// The selected profile, if any.
    pub fn profile(&self) -> Option<Profile> {
        Profile::from_selection(&self.profile)
    }

    pub fn options(&self) -> AdaptationOptions {
        AdaptationOptions::default()
            .with_dyslexia_level(self.dyslexia_level)
            .with_summary_length(self.adhd_summary_length)
            .with_grade_level(self.grade_level)
    }
}

/// Source of persisted settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<UserSettings, SettingsError>;
}

/// Settings kept in a JSON file. A missing file means defaults.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<UserSettings, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                Ok(UserSettings::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Adapt the page from persisted settings, once, after the page settles.
///
/// Returns `Ok(None)` when auto-adapt is off, no profile is selected or the
/// settings cannot be read.
pub async fn auto_adapt_on_load<H: HostDocument>(
    controller: &PageController<H>,
    store: &dyn SettingsStore,
    settle_delay: Duration,
) -> Result<Option<RunReport>, ControllerError> {
    let settings = match store.load().await {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = %err, "Could not load settings, skipping auto-adapt");
            return Ok(None);
        }
    };

    if !settings.auto_adapt {
        return Ok(None);
    }
    let Some(profile) = settings.profile() else {
        debug!("Auto-adapt enabled without a profile");
        return Ok(None);
    };

    info!(profile = %profile, delay_ms = settle_delay.as_millis() as u64, "Auto-adapting after settle delay");
    tokio::time::sleep(settle_delay).await;
    controller
        .adapt_page(profile, Some(settings.options()))
        .await
        .map(Some)
}

//! Progress and notification sink.
//!
//! The core reports semantic events only: loading state, `completed/total`
//! counts, and terminal messages with a severity. Presentation belongs to
//! whatever implements [`NotificationSink`].

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::types::Severity;

/// Receiver for run progress and notifications.
pub trait NotificationSink: Send + Sync {
    /// Show the loading indicator.
    fn loading_started(&self, message: &str);

    /// Progress update, sent after every block or job completion.
    fn progress(&self, completed: usize, total: usize);

    /// Hide the loading indicator.
    fn loading_finished(&self);

    /// Terminal message for a run.
    fn notify(&self, message: &str, severity: Severity);

    /// Remove any visible notification.
    fn dismiss(&self) {}
}

/// Sink that writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn loading_started(&self, message: &str) {
        info!(text = message, "Loading");
    }

    fn progress(&self, completed: usize, total: usize) {
        debug!(completed, total, "Progress");
    }

    fn loading_finished(&self) {
        debug!("Loading finished");
    }

    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => error!(text = message, "Notification"),
            Severity::Warning => warn!(text = message, "Notification"),
            Severity::Success | Severity::Info => info!(text = message, "Notification"),
        }
    }
}

/// A recorded sink event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    LoadingStarted(String),
    Progress { completed: usize, total: usize },
    LoadingFinished,
    Notification { message: String, severity: Severity },
    Dismissed,
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Terminal notifications in order.
    pub fn notifications(&self) -> Vec<(String, Severity)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Notification { message, severity } => Some((message, severity)),
                _ => None,
            })
            .collect()
    }

    /// Progress updates in order.
    pub fn progress_updates(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Progress { completed, total } => Some((completed, total)),
                _ => None,
            })
            .collect()
    }

    /// Number of `loading_started` and `loading_finished` events.
    pub fn loading_counts(&self) -> (usize, usize) {
        self.events().iter().fold((0, 0), |(start, end), e| match e {
            SinkEvent::LoadingStarted(_) => (start + 1, end),
            SinkEvent::LoadingFinished => (start, end + 1),
            _ => (start, end),
        })
    }
}

impl NotificationSink for RecordingSink {
    fn loading_started(&self, message: &str) {
        self.record(SinkEvent::LoadingStarted(message.to_string()));
    }

    fn progress(&self, completed: usize, total: usize) {
        self.record(SinkEvent::Progress { completed, total });
    }

    fn loading_finished(&self) {
        self.record(SinkEvent::LoadingFinished);
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.record(SinkEvent::Notification {
            message: message.to_string(),
            severity,
        });
    }

    fn dismiss(&self) {
        self.record(SinkEvent::Dismissed);
    }
}

/// Holds the loading indicator; releases it exactly once.
pub struct LoadingGuard {
    sink: Arc<dyn NotificationSink>,
    released: bool,
}

impl LoadingGuard {
    pub fn start(sink: Arc<dyn NotificationSink>, message: &str) -> Self {
        sink.loading_started(message);
        Self {
            sink,
            released: false,
        }
    }

    /// Hide the indicator now.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.released {
            self.released = true;
            self.sink.loading_finished();
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

//! User-facing trade notifications.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// How a notification should be rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Receives short confirmations and failures meant for the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str, severity: Severity);
}

/// Forwards notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::warn!(%title, "{}", message),
            Severity::Info | Severity::Success => tracing::info!(%title, "{}", message),
        }
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Keeps every notification in memory, newest last.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries().pop()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Notification {
                title: title.to_string(),
                message: message.to_string(),
                severity,
            });
        }
    }
}

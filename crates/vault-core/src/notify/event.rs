//! Webhook event types and payload shape

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of events the dispatcher can post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BackupSuccess,
    BackupFailed,
    DriftDetected,
    RestoreSuccess,
    RestoreFailed,
    ValidationFailed,
    ServiceRestartFailed,
    Test,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        Self::BackupSuccess,
        Self::BackupFailed,
        Self::DriftDetected,
        Self::RestoreSuccess,
        Self::RestoreFailed,
        Self::ValidationFailed,
        Self::ServiceRestartFailed,
        Self::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackupSuccess => "backup_success",
            Self::BackupFailed => "backup_failed",
            Self::DriftDetected => "drift_detected",
            Self::RestoreSuccess => "restore_success",
            Self::RestoreFailed => "restore_failed",
            Self::ValidationFailed => "validation_failed",
            Self::ServiceRestartFailed => "service_restart_failed",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|e| e.as_str()).collect();
                format!("unknown event '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Urgency attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// An event to be posted, before host and run metadata are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub message: String,
    pub data: Value,
}

impl WebhookEvent {
    pub fn new(event_type: EventType, severity: EventSeverity, message: impl Into<String>) -> Self {
        Self {
            event_type,
            severity,
            message: message.into(),
            data: Value::Object(Default::default()),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Run metadata attached to every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    pub git_commit: Option<String>,
    pub user: String,
    pub repo: String,
}

/// JSON body posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub event: EventType,
    pub timestamp: String,
    pub hostname: String,
    pub system_id: String,
    pub severity: EventSeverity,
    pub message: String,
    pub data: Value,
    pub metadata: PayloadMetadata,
}

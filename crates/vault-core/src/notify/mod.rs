//! Notification dispatcher
//!
//! Posts structured events to a webhook endpoint. Delivery is fire-and-forget:
//! every failure ends in a log line, never in an error for the caller.

pub mod event;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

pub use event::{EventSeverity, EventType, Payload, PayloadMetadata, WebhookEvent};
pub use transport::{HttpTransport, WebhookTransport};

use crate::config::{HostIdentity, WebhookSettings};

/// What happened to a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notifications are turned off
    Disabled,
    /// The event type is not in the allow-list
    Filtered,
    /// A 2xx response was received
    Delivered { attempts: u32 },
    /// All attempts failed
    Failed { attempts: u32 },
}

/// Sends [`WebhookEvent`]s with filtering and bounded retry.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    settings: WebhookSettings,
    hostname: String,
    system_id: String,
    repo: String,
    transport: Arc<dyn WebhookTransport>,
}

impl NotificationDispatcher {
    pub fn new(
        settings: WebhookSettings,
        host: &HostIdentity,
        repo: impl Into<String>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            settings,
            hostname: host.bound_hostname.clone(),
            system_id: host.system_id.clone(),
            repo: repo.into(),
            transport,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled && self.settings.url.is_some()
    }

    /// Build the JSON payload for `event`.
    pub fn payload(&self, event: &WebhookEvent, git_commit: Option<&str>) -> Payload {
        Payload {
            event: event.event_type,
            timestamp: Utc::now().to_rfc3339(),
            hostname: self.hostname.clone(),
            system_id: self.system_id.clone(),
            severity: event.severity,
            message: event.message.clone(),
            data: event.data.clone(),
            metadata: PayloadMetadata {
                git_commit: git_commit.map(str::to_string),
                user: current_user(),
                repo: self.repo.clone(),
            },
        }
    }

    /// Post `event` unless disabled or filtered, retrying on failure.
    pub fn dispatch(&self, event: &WebhookEvent, git_commit: Option<&str>) -> DispatchOutcome {
        if !self.is_enabled() {
            return DispatchOutcome::Disabled;
        }
        if !self.settings.events.contains(&event.event_type) {
            tracing::debug!(event = %event.event_type, "Event not in allow-list, not sending");
            return DispatchOutcome::Filtered;
        }
        self.send(event, git_commit)
    }

    /// Post `event` regardless of the allow-list; used for test events.
    pub fn send(&self, event: &WebhookEvent, git_commit: Option<&str>) -> DispatchOutcome {
        let Some(url) = self.settings.url.as_deref().filter(|_| self.settings.enabled) else {
            return DispatchOutcome::Disabled;
        };

        let body = match serde_json::to_string(&self.payload(event, git_commit)) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(event = %event.event_type, error = %e, "Failed to serialize webhook payload");
                return DispatchOutcome::Failed { attempts: 0 };
            }
        };

        let attempts = self.settings.retry_count.max(1);
        let delay = self.settings.retry_delay();

        for attempt in 1..=attempts {
            match self.transport.post(url, &body) {
                Ok(status) if (200..300).contains(&status) => {
                    tracing::info!(event = %event.event_type, status, attempt, "Webhook delivered");
                    return DispatchOutcome::Delivered { attempts: attempt };
                }
                Ok(status) => {
                    tracing::warn!(event = %event.event_type, status, attempt, attempts, "Webhook rejected");
                }
                Err(e) => {
                    tracing::warn!(event = %event.event_type, error = %e, attempt, attempts, "Webhook attempt failed");
                }
            }
            if attempt < attempts {
                sleep(delay);
            }
        }

        tracing::error!(event = %event.event_type, attempts, "Webhook delivery failed, giving up");
        DispatchOutcome::Failed { attempts }
    }
}

fn sleep(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

//! Notification payloads and provider fan-out.
//!
//! Providers are attempted concurrently, one thread each. A failing provider
//! is logged and recorded in its [`DeliveryOutcome`]; it never aborts the
//! others and never fails the cycle.

use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vaultsync_core::DiffResult;

use crate::SyncError;

/// Most keys listed in a notification body before eliding the rest.
const MAX_LISTED_KEYS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failure,
}

/// What providers deliver. Carries keys only, never values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub status: SyncStatus,
    pub title: String,
    pub message: String,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    /// Payload for a cycle whose changes were applied and the service restarted.
    pub fn success(diff: &DiffResult) -> Self {
        let total = diff.change_count();
        Self::build(
            SyncStatus::Success,
            format!(
                "Synced {total} variable{}",
                if total == 1 { "" } else { "s" }
            ),
            change_lines(diff).join("\n"),
            diff,
        )
    }

    /// Payload for a cycle that computed changes but failed to apply them.
    pub fn failure(diff: &DiffResult, error: &SyncError) -> Self {
        let mut lines = vec![format!("Error: {error}")];
        lines.extend(change_lines(diff));
        Self::build(
            SyncStatus::Failure,
            "Variable sync failed".to_string(),
            lines.join("\n"),
            diff,
        )
    }

    fn build(status: SyncStatus, title: String, message: String, diff: &DiffResult) -> Self {
        Self {
            status,
            title,
            message,
            added: diff.to_add.len(),
            updated: diff.to_update.len(),
            deleted: diff.to_delete.len(),
            timestamp: Utc::now(),
        }
    }
}

fn change_lines(diff: &DiffResult) -> Vec<String> {
    let keys = diff
        .to_add
        .iter()
        .map(|r| format!("+ {}", r.key))
        .chain(diff.to_update.iter().map(|u| format!("~ {}", u.key)))
        .chain(diff.to_delete.iter().map(|r| format!("- {}", r.key)));

    let mut lines: Vec<String> = keys.take(MAX_LISTED_KEYS).collect();
    let total = diff.change_count();
    if total > MAX_LISTED_KEYS {
        lines.push(format!("… and {} more", total - MAX_LISTED_KEYS));
    }
    lines
}

/// A push-notification channel.
pub trait NotificationProvider: Send + Sync {
    /// Short name used in logs and outcomes.
    fn name(&self) -> &str;

    fn send(&self, payload: &NotificationPayload) -> Result<(), SyncError>;
}

/// Result of one provider's delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Fans a payload out to every configured provider.
#[derive(Default)]
pub struct NotificationDispatcher {
    providers: Vec<Box<dyn NotificationProvider>>,
}

impl NotificationDispatcher {
    pub fn new(providers: Vec<Box<dyn NotificationProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Attempt delivery on every provider and wait for all of them.
    ///
    /// Outcomes are returned in provider order.
    pub fn dispatch(&self, payload: &NotificationPayload) -> Vec<DeliveryOutcome> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .providers
                .iter()
                .map(|provider| {
                    let handle = scope.spawn(move || provider.send(payload));
                    (provider.name(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    let error = match handle.join() {
                        Ok(Ok(())) => {
                            tracing::info!("notification delivered via {name}");
                            None
                        }
                        Ok(Err(err)) => {
                            tracing::warn!("notification via {name} failed: {err}");
                            Some(err.to_string())
                        }
                        Err(_) => {
                            tracing::warn!("notification via {name} panicked");
                            Some("provider panicked".to_string())
                        }
                    };
                    DeliveryOutcome {
                        provider: name.to_string(),
                        error,
                    }
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use vaultsync_core::{diff, Snapshot};

    use super::*;

    fn sample() -> DiffResult {
        let current = Snapshot::from_pairs([("A", "secret-a"), ("B", "secret-b")]);
        let desired = Snapshot::from_pairs([("B", "secret-b2"), ("C", "secret-c")]);
        diff(&current, &desired)
    }

    #[test]
    fn success_payload_lists_keys_without_values() {
        let payload = NotificationPayload::success(&sample());
        assert_eq!(payload.status, SyncStatus::Success);
        assert_eq!(payload.title, "Synced 3 variables");
        assert_eq!(payload.message, "+ C\n~ B\n- A");
        assert!(!payload.message.contains("secret"));
        assert_eq!((payload.added, payload.updated, payload.deleted), (1, 1, 1));
    }

    #[test]
    fn failure_payload_leads_with_error() {
        let err = SyncError::Api {
            service: "railway",
            message: "forbidden".to_string(),
        };
        let payload = NotificationPayload::failure(&sample(), &err);
        assert_eq!(payload.status, SyncStatus::Failure);
        assert!(payload
            .message
            .starts_with("Error: railway rejected the request: forbidden"));
    }

    #[test]
    fn long_change_lists_are_elided() {
        let desired = Snapshot::from_pairs((0..25).map(|i| (format!("K{i}"), "v")));
        let diff = diff(&Snapshot::new(), &desired);
        let payload = NotificationPayload::success(&diff);
        let lines: Vec<_> = payload.message.lines().collect();
        assert_eq!(lines.len(), MAX_LISTED_KEYS + 1);
        assert_eq!(lines.last().copied(), Some("… and 5 more"));
    }

    #[test]
    fn empty_dispatcher_returns_no_outcomes() {
        let dispatcher = NotificationDispatcher::default();
        let payload = NotificationPayload::success(&sample());
        assert!(dispatcher.dispatch(&payload).is_empty());
    }

    #[test]
    fn payload_serializes_status_lowercase() {
        let payload = NotificationPayload::success(&sample());
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["status"], "success");
    }
}

//! ntfy notification provider: one plain-text POST per payload.

use std::time::Duration;

use vaultsync_core::config::NtfyConfig;
use vaultsync_sync::{NotificationPayload, NotificationProvider, SyncError, SyncStatus};

use crate::http;

const SERVICE: &str = "ntfy";

pub struct NtfyClient {
    agent: ureq::Agent,
    url: String,
}

impl NtfyClient {
    pub fn new(config: &NtfyConfig, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            url: format!("{}/{}", config.server.trim_end_matches('/'), config.topic),
        }
    }
}

fn headers(status: SyncStatus) -> [(&'static str, &'static str); 2] {
    match status {
        SyncStatus::Success => [("Tags", "white_check_mark"), ("Priority", "default")],
        SyncStatus::Failure => [("Tags", "rotating_light"), ("Priority", "high")],
    }
}

impl NotificationProvider for NtfyClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn send(&self, payload: &NotificationPayload) -> Result<(), SyncError> {
        let mut request = self.agent.post(&self.url).set("Title", &payload.title);
        for (name, value) in headers(payload.status) {
            request = request.set(name, value);
        }
        http::check(SERVICE, request.send_string(&payload.message))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_server_and_topic() {
        let client = NtfyClient::new(
            &NtfyConfig {
                server: "https://ntfy.example.com/".to_string(),
                topic: "deploys".to_string(),
            },
            Duration::from_secs(1),
        );
        assert_eq!(client.url, "https://ntfy.example.com/deploys");
    }

    #[test]
    fn failure_is_tagged_high_priority() {
        assert!(headers(SyncStatus::Failure).contains(&("Priority", "high")));
        assert!(headers(SyncStatus::Success).contains(&("Priority", "default")));
    }
}

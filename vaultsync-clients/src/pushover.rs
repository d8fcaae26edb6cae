//! Pushover notification provider.

use std::time::Duration;

use serde::Deserialize;

use vaultsync_core::config::{PushoverConfig, Secret};
use vaultsync_sync::{NotificationPayload, NotificationProvider, SyncError, SyncStatus};

use crate::error::ClientError;
use crate::http;

pub const PUSHOVER_MESSAGES_URL: &str = "https://api.pushover.net/1/messages.json";
const SERVICE: &str = "pushover";

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

pub struct PushoverClient {
    agent: ureq::Agent,
    endpoint: String,
    app_token: Secret,
    user_key: Secret,
}

impl PushoverClient {
    pub fn new(config: &PushoverConfig, timeout: Duration) -> Self {
        Self::with_endpoint(config, timeout, PUSHOVER_MESSAGES_URL)
    }

    pub fn with_endpoint(config: &PushoverConfig, timeout: Duration, endpoint: &str) -> Self {
        Self {
            agent: http::agent(timeout),
            endpoint: endpoint.to_string(),
            app_token: config.app_token.clone(),
            user_key: config.user_key.clone(),
        }
    }

    fn form<'a>(&'a self, payload: &'a NotificationPayload) -> Vec<(&'static str, &'a str)> {
        let priority = match payload.status {
            SyncStatus::Success => "0",
            SyncStatus::Failure => "1",
        };
        vec![
            ("token", self.app_token.expose()),
            ("user", self.user_key.expose()),
            ("title", payload.title.as_str()),
            ("message", payload.message.as_str()),
            ("priority", priority),
        ]
    }
}

impl NotificationProvider for PushoverClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn send(&self, payload: &NotificationPayload) -> Result<(), SyncError> {
        let response = http::check(
            SERVICE,
            self.agent.post(&self.endpoint).send_form(&self.form(payload)),
        )?;
        let body: PushoverResponse = response
            .into_json()
            .map_err(|err| ClientError::decode(SERVICE, err))?;
        if body.status != 1 {
            return Err(SyncError::Api {
                service: SERVICE,
                message: body.errors.join("; "),
            });
        }
        Ok(())
    }
}
